/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Cosign verification through the signature service.
//!
//! Keyless signatures are checked against the fixture CA and a static
//! transparency log; key-based signatures against the trust store.

use crate::fixtures::*;
use depot_trust::crypto::{ContentDigest, IntegrityHasher};
use depot_trust::models::{messages, LogResult};
use depot_trust::security::{ArtifactInput, StaticLog};
use depot_trust::{KeyType, VerificationStatus};

/// A certificate from the trusted CA with a proven log entry is valid.
#[tokio::test]
async fn test_keyless_signature_with_proven_entry_is_valid() {
    let ctx = TestContext::new().await;
    let stored = ctx.store_keyless(LEAF_VALID).await;

    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();

    assert!(outcome.is_complete());
    let signature = outcome.signature();
    assert_eq!(signature.status(), VerificationStatus::Valid);
    assert_eq!(
        signature.verification.method.as_deref(),
        Some("cosign-keyless")
    );
    assert_eq!(
        signature.signer_identity.as_deref(),
        Some("builder@example.com")
    );
}

/// Keyless verification works from the artifact digest alone.
#[tokio::test]
async fn test_keyless_signature_verifies_from_digest() {
    let ctx = TestContext::new().await;
    let stored = ctx.store_keyless(LEAF_VALID).await;

    let digest: ContentDigest = IntegrityHasher::hash_bytes(ARTIFACT)
        .to_prefixed()
        .parse()
        .unwrap();
    let outcome = ctx
        .service
        .verify_signature(
            &ctx.actor,
            stored.id,
            ArtifactInput::from_digest(&digest).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status(), VerificationStatus::Valid);
}

/// An entry whose inclusion proof does not reach the signed root is not
/// accepted, even though the signature itself is correct.
#[tokio::test]
async fn test_unproven_log_entry_is_untrusted() {
    let ctx = TestContext::with_log(tampered_log()).await;
    let stored = ctx.store_keyless(LEAF_VALID).await;

    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();

    let signature = outcome.signature();
    assert_eq!(signature.status(), VerificationStatus::Untrusted);
    assert!(!signature.verification.verified);
    assert!(signature
        .verification
        .error
        .as_deref()
        .unwrap()
        .starts_with(messages::LOG_ENTRY_NOT_PROVEN));
}

/// A certificate issued by a CA outside the configured roots is untrusted.
#[tokio::test]
async fn test_certificate_from_untrusted_ca_is_untrusted() {
    let ctx = TestContext::new().await;
    let stored = ctx.store_keyless(LEAF_UNTRUSTED).await;

    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();

    let signature = outcome.signature();
    assert_eq!(signature.status(), VerificationStatus::Untrusted);
    assert_eq!(
        signature.verification.error.as_deref(),
        Some(messages::UNTRUSTED_CA)
    );
}

/// A certificate from the trusted CA that was issued for TLS rather than
/// code signing does not vouch for an artifact.
#[tokio::test]
async fn test_certificate_not_for_code_signing_is_untrusted() {
    let ctx = TestContext::new().await;
    let stored = ctx.store_keyless(LEAF_SERVER_AUTH).await;

    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();

    let signature = outcome.signature();
    assert_eq!(signature.status(), VerificationStatus::Untrusted);
    assert!(!signature.verification.verified);
    assert_eq!(
        signature.verification.error.as_deref(),
        Some(messages::UNTRUSTED_CA)
    );
}

/// An unreachable log leaves the signature untrusted and re-verifiable; a
/// later attempt with the log back reaches a verdict.
#[tokio::test]
async fn test_unavailable_log_is_incomplete_then_reverifies() {
    let ctx = TestContext::with_log(StaticLog::unavailable()).await;
    let stored = ctx.store_keyless(LEAF_VALID).await;

    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();

    assert!(!outcome.is_complete());
    let signature = outcome.signature();
    assert_eq!(signature.status(), VerificationStatus::Untrusted);
    assert!(!signature.verification.verified);
    assert_eq!(
        signature.verification.error.as_deref(),
        Some(messages::LOG_UNAVAILABLE)
    );
    assert_eq!(
        signature.verification.method.as_deref(),
        Some("cosign-keyless")
    );

    let logs = ctx
        .service
        .list_verification_logs(ctx.tenant, stored.id)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].verification_result, LogResult::Incomplete);

    let recovered = ctx.service_with_log(proven_log());
    let outcome = recovered
        .reverify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.status(), VerificationStatus::Valid);
    assert_eq!(outcome.signature().verification.error, None);
}

/// A key-based signature is only valid once its key is in the trust store.
#[tokio::test]
async fn test_keyed_signature_requires_trusted_key() {
    let ctx = TestContext::new().await;

    let stored = ctx.store_keyed().await;
    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();
    assert_eq!(outcome.status(), VerificationStatus::Untrusted);
    assert_eq!(
        outcome.signature().verification.error.as_deref(),
        Some(messages::KEY_NOT_IN_TRUST_STORE)
    );

    let key = ctx.trust_key(KeyType::Cosign, COSIGN_PUB).await;
    let outcome = ctx
        .service
        .reverify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();
    let signature = outcome.signature();
    assert_eq!(signature.status(), VerificationStatus::Valid);
    assert_eq!(signature.verification.method.as_deref(), Some("cosign-key"));
    assert_eq!(
        signature.signer_fingerprint.as_deref(),
        Some(key.fingerprint.as_str())
    );
}
