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

//! PGP verification through the signature service.
//!
//! These tests store detached signatures, verify them against keys held in
//! the trust store and check both the persisted state and the audit trail.

use crate::fixtures::*;
use depot_trust::crypto::{ContentDigest, IntegrityHasher};
use depot_trust::models::{messages, LogResult};
use depot_trust::security::{AddPublicKeyRequest, AdminError, ArtifactInput, ServiceError};
use depot_trust::{KeyType, SignatureFormat, VerificationStatus};
use uuid::Uuid;

/// A signature by a trusted key goes from pending to valid and is logged.
#[tokio::test]
async fn test_trusted_pgp_signature_becomes_valid() {
    let ctx = TestContext::new().await;
    ctx.trust_key(KeyType::Pgp, ALICE_ASC).await;

    let stored = ctx.store_pgp(SignatureFormat::Binary, ALICE_SIG).await;
    assert_eq!(stored.status(), VerificationStatus::Pending);
    assert!(!stored.verification.verified);

    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();
    assert!(outcome.is_complete());

    let verified = outcome.signature();
    assert_eq!(verified.status(), VerificationStatus::Valid);
    assert!(verified.verification.verified);
    assert_eq!(verified.verification.method.as_deref(), Some("pgp"));
    assert_eq!(verified.verification.verified_by, ctx.actor.actor_id);
    assert!(verified.verification.verified_at.is_some());
    assert_eq!(verified.signer_fingerprint.as_deref(), Some(ALICE_FPR));
    assert_eq!(verified.signer_identity.as_deref(), Some("alice@example.com"));
    assert_eq!(verified.signature_data, ALICE_SIG);

    let logs = ctx
        .service
        .list_verification_logs(ctx.tenant, stored.id)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].verification_result, LogResult::Success);
    assert_eq!(logs[0].verification_status, VerificationStatus::Valid);
    assert_eq!(logs[0].verification_type, "pgp");
    assert_eq!(logs[0].error_code, None);
    assert_eq!(logs[0].client_ip.as_deref(), Some("192.0.2.10"));
    assert_eq!(logs[0].user_agent.as_deref(), Some("depot-trust-tests"));
}

/// Armored signatures verify like their binary form.
#[tokio::test]
async fn test_armored_signature_verifies() {
    let ctx = TestContext::new().await;
    ctx.trust_key(KeyType::Pgp, ALICE_ASC).await;

    let stored = ctx.store_pgp(SignatureFormat::AsciiArmor, ALICE_SIG_ASC).await;
    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();

    assert_eq!(outcome.status(), VerificationStatus::Valid);
}

/// A signer missing from the trust store is untrusted, not invalid.
#[tokio::test]
async fn test_unknown_signer_is_untrusted() {
    let ctx = TestContext::new().await;
    ctx.trust_key(KeyType::Pgp, ALICE_ASC).await;

    let stored = ctx.store_pgp(SignatureFormat::Binary, MALLORY_SIG).await;
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
        Some(messages::SIGNER_NOT_IN_KEYRING)
    );

    let logs = ctx
        .service
        .list_verification_logs(ctx.tenant, stored.id)
        .await
        .unwrap();
    assert_eq!(logs[0].verification_result, LogResult::Failure);
    assert_eq!(logs[0].error_code.as_deref(), Some("signer_untrusted"));
}

/// Keys imported without the trusted flag do not vouch for signatures.
#[tokio::test]
async fn test_key_not_marked_trusted_is_ignored() {
    let ctx = TestContext::new().await;
    ctx.service
        .add_public_key(&ctx.actor, AddPublicKeyRequest::new(KeyType::Pgp, ALICE_ASC))
        .await
        .unwrap();

    let stored = ctx.store_pgp(SignatureFormat::Binary, ALICE_SIG).await;
    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();

    assert_eq!(outcome.status(), VerificationStatus::Untrusted);
}

/// A key scoped to one repository only vouches for signatures stored there.
#[tokio::test]
async fn test_repository_scoped_key() {
    let ctx = TestContext::new().await;
    let mut request = AddPublicKeyRequest::new(KeyType::Pgp, BOB_ASC);
    request.trusted = true;
    request.repository_id = Some(ctx.repository_id);
    let key = ctx.service.add_public_key(&ctx.actor, request).await.unwrap();
    assert_eq!(key.fingerprint, BOB_FPR);
    assert_eq!(key.repository_id, Some(ctx.repository_id));

    let inside = ctx.store_pgp(SignatureFormat::Binary, BOB_SIG).await;
    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, inside.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();
    assert_eq!(outcome.status(), VerificationStatus::Valid);
    assert_eq!(
        outcome.signature().signer_identity.as_deref(),
        Some("bob@example.com")
    );

    let outside = ctx
        .store_pgp_in(
            Uuid::new_v4(),
            Uuid::new_v4(),
            SignatureFormat::Binary,
            BOB_SIG,
        )
        .await;
    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, outside.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();
    assert_eq!(outcome.status(), VerificationStatus::Untrusted);
}

/// Content that differs from what was signed is invalid.
#[tokio::test]
async fn test_modified_artifact_is_invalid() {
    let ctx = TestContext::new().await;
    ctx.trust_key(KeyType::Pgp, ALICE_ASC).await;

    let stored = ctx.store_pgp(SignatureFormat::Binary, ALICE_SIG).await;
    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(b"0123456788"))
        .await
        .unwrap();

    let signature = outcome.signature();
    assert_eq!(signature.status(), VerificationStatus::Invalid);
    assert_eq!(
        signature.verification.error.as_deref(),
        Some(messages::SIGNATURE_MISMATCH)
    );
}

/// PGP needs the artifact bytes; a digest alone is a caller error and the
/// signature stays pending.
#[tokio::test]
async fn test_digest_only_input_is_rejected() {
    let ctx = TestContext::new().await;
    ctx.trust_key(KeyType::Pgp, ALICE_ASC).await;
    let stored = ctx.store_pgp(SignatureFormat::Binary, ALICE_SIG).await;

    let digest: ContentDigest = IntegrityHasher::hash_bytes(ARTIFACT)
        .to_prefixed()
        .parse()
        .unwrap();
    let result = ctx
        .service
        .verify_signature(
            &ctx.actor,
            stored.id,
            ArtifactInput::from_digest(&digest).unwrap(),
        )
        .await;
    assert!(matches!(result, Err(ServiceError::Contract(_))));

    let reloaded = ctx.service.get_signature(ctx.tenant, stored.id).await.unwrap();
    assert_eq!(reloaded.status(), VerificationStatus::Pending);
}

/// Key material carrying a second certificate is refused at import, so the
/// extra certificate can never vouch for a signature.
#[tokio::test]
async fn test_bundled_certificates_are_refused() {
    let ctx = TestContext::new().await;
    let mut request = AddPublicKeyRequest::new(KeyType::Pgp, ALICE_MALLORY_BUNDLE_ASC);
    request.trusted = true;
    let result = ctx.service.add_public_key(&ctx.actor, request).await;
    assert!(matches!(result, Err(ServiceError::Admin(AdminError::Pgp(_)))));

    let stored = ctx.store_pgp(SignatureFormat::Binary, MALLORY_SIG).await;
    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();
    assert_eq!(outcome.status(), VerificationStatus::Untrusted);
}

/// A subkey appended to a trusted certificate without a binding signature
/// does not sign for it.
#[tokio::test]
async fn test_unbound_subkey_does_not_sign() {
    let ctx = TestContext::new().await;
    let key = ctx.trust_key(KeyType::Pgp, ALICE_UNBOUND_SUBKEY_ASC).await;
    assert_eq!(key.fingerprint, ALICE_FPR);

    let forged = ctx.store_pgp(SignatureFormat::Binary, MALLORY_SIG).await;
    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, forged.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();
    let signature = outcome.signature();
    assert_eq!(signature.status(), VerificationStatus::Untrusted);
    assert!(!signature.verification.verified);
    assert_ne!(signature.signer_fingerprint.as_deref(), Some(ALICE_FPR));

    let genuine = ctx.store_pgp(SignatureFormat::Binary, ALICE_SIG).await;
    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, genuine.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();
    assert_eq!(outcome.status(), VerificationStatus::Valid);
}

/// SHA-1 signatures from a trusted key are invalid.
#[tokio::test]
async fn test_sha1_signature_is_invalid() {
    let ctx = TestContext::new().await;
    ctx.trust_key(KeyType::Pgp, CAROL_ASC).await;

    let stored = ctx.store_pgp(SignatureFormat::Binary, CAROL_SHA1_SIG).await;
    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();
    let signature = outcome.signature();
    assert_eq!(signature.status(), VerificationStatus::Invalid);
    assert!(signature
        .verification
        .error
        .as_deref()
        .unwrap()
        .starts_with(messages::WEAK_HASH_ALGORITHM));
}
