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

//! Signature service lifecycle, policy and gate tests.

use crate::fixtures::*;
use chrono::{Duration, Utc};
use depot_trust::models::{messages, LogResult, PgpPayload, SigstorePayload};
use depot_trust::security::{
    ArtifactInput, EnforcementError, RevokeKeyRequest, ServiceError,
};
use depot_trust::{
    KeyType, NewArtifactSignature, PolicySettings, SignatureFormat, SignaturePayload,
    SignaturePolicy, VerificationResult, VerificationStatus,
};
use uuid::Uuid;

fn required_policy() -> PolicySettings {
    PolicySettings {
        signature_policy: SignaturePolicy::Required,
        ..Default::default()
    }
}

/// A required policy rejects unsigned uploads; a trusted PGP signature
/// verifies; revoking its key and re-verifying leaves it untrusted and the
/// artifact can no longer be served.
#[tokio::test]
async fn test_required_policy_sign_verify_revoke_reverify() {
    let ctx = TestContext::new().await;
    ctx.service
        .update_repository_policy(&ctx.actor, ctx.repository_id, required_policy())
        .await
        .unwrap();

    let rejected = ctx
        .service
        .check_upload(&ctx.actor, ctx.repository_id, false)
        .await;
    match rejected {
        Err(ServiceError::Denied(EnforcementError::SignatureRequired { policy })) => {
            assert_eq!(policy, "required");
        }
        other => panic!("expected a signature-required denial, got {:?}", other),
    }
    ctx.service
        .check_upload(&ctx.actor, ctx.repository_id, true)
        .await
        .unwrap();

    let key = ctx.trust_key(KeyType::Pgp, ALICE_ASC).await;
    let stored = ctx.store_pgp(SignatureFormat::Binary, ALICE_SIG).await;
    assert_eq!(stored.status(), VerificationStatus::Pending);

    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();
    assert_eq!(outcome.status(), VerificationStatus::Valid);
    ctx.service
        .authorize_download(&ctx.actor, ctx.repository_id, stored.artifact_id)
        .await
        .unwrap();

    let revoked = ctx
        .service
        .revoke_public_key(
            &ctx.actor,
            key.id,
            RevokeKeyRequest {
                reason: Some("key compromised".to_string()),
            },
        )
        .await
        .unwrap();
    assert!(revoked.revoked);
    assert!(revoked.revoked_at.is_some());
    assert_eq!(revoked.revocation_reason.as_deref(), Some("key compromised"));

    // Revocation alone does not rewrite verdicts already recorded.
    let before = ctx.service.get_signature(ctx.tenant, stored.id).await.unwrap();
    assert_eq!(before.status(), VerificationStatus::Valid);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let outcome = ctx
        .service
        .reverify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();
    let signature = outcome.signature();
    assert_eq!(signature.status(), VerificationStatus::Untrusted);
    assert!(!signature.verification.verified);
    assert_eq!(
        signature.verification.error.as_deref(),
        Some(messages::SIGNER_NOT_IN_KEYRING)
    );
    // Signer details from the earlier verdict survive a verdict that lacks them.
    assert_eq!(signature.signer_identity.as_deref(), Some("alice@example.com"));
    assert_eq!(signature.signer_fingerprint.as_deref(), Some(ALICE_FPR));

    let denied = ctx
        .service
        .authorize_download(&ctx.actor, ctx.repository_id, stored.artifact_id)
        .await;
    assert!(matches!(
        denied,
        Err(ServiceError::Denied(EnforcementError::NoValidSignature))
    ));

    let logs = ctx
        .service
        .list_verification_logs(ctx.tenant, stored.id)
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].verification_result, LogResult::Failure);
    assert_eq!(logs[0].verification_status, VerificationStatus::Untrusted);
    assert_eq!(logs[1].verification_result, LogResult::Success);
    assert!(logs[0].created_at >= logs[1].created_at);
}

/// Only pending signatures can be verified.
#[tokio::test]
async fn test_verifying_twice_requires_reverify() {
    let ctx = TestContext::new().await;
    ctx.trust_key(KeyType::Pgp, ALICE_ASC).await;
    let stored = ctx.store_pgp(SignatureFormat::Binary, ALICE_SIG).await;

    ctx.service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();
    let again = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await;

    match again {
        Err(ServiceError::NotPending { id, status }) => {
            assert_eq!(id, stored.id);
            assert_eq!(status, VerificationStatus::Valid);
        }
        other => panic!("expected NotPending, got {:?}", other),
    }
}

/// A scheme switched off by policy never reaches its verifier.
#[tokio::test]
async fn test_disabled_scheme_is_untrusted() {
    let ctx = TestContext::new().await;
    ctx.trust_key(KeyType::Pgp, ALICE_ASC).await;
    ctx.service
        .update_repository_policy(
            &ctx.actor,
            ctx.repository_id,
            PolicySettings {
                pgp_enabled: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stored = ctx.store_pgp(SignatureFormat::Binary, ALICE_SIG).await;
    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();

    assert_eq!(outcome.status(), VerificationStatus::Untrusted);
    assert_eq!(
        outcome.signature().verification.error.as_deref(),
        Some(messages::SCHEME_DISABLED)
    );
}

/// A signature past its expiry is recorded as expired.
#[tokio::test]
async fn test_expired_signature() {
    let ctx = TestContext::new().await;
    ctx.trust_key(KeyType::Pgp, ALICE_ASC).await;

    let mut signature = NewArtifactSignature::new(
        Uuid::new_v4(),
        ctx.repository_id,
        SignatureFormat::Binary,
        ALICE_SIG.to_vec(),
        "pgp",
        SignaturePayload::Pgp(PgpPayload::default()),
    );
    signature.expires_at = Some(Utc::now() - Duration::hours(1));
    let stored = ctx
        .service
        .store_signature(&ctx.actor, signature)
        .await
        .unwrap();

    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();

    assert_eq!(outcome.status(), VerificationStatus::Expired);
    assert_eq!(
        outcome.signature().verification.error.as_deref(),
        Some(messages::SIGNATURE_EXPIRED)
    );
}

/// Sigstore attestations can be stored but not verified.
#[tokio::test]
async fn test_sigstore_verification_is_unsupported() {
    let ctx = TestContext::new().await;
    let signature = NewArtifactSignature::new(
        Uuid::new_v4(),
        ctx.repository_id,
        SignatureFormat::Binary,
        b"{\"mediaType\":\"bundle\"}".to_vec(),
        "sigstore-bundle",
        SignaturePayload::Sigstore(SigstorePayload {
            predicate_type: Some("https://slsa.dev/provenance/v1".to_string()),
            ..Default::default()
        }),
    );
    let stored = ctx
        .service
        .store_signature(&ctx.actor, signature)
        .await
        .unwrap();

    let result = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await;
    match result {
        Err(ServiceError::Contract(reason)) => {
            assert_eq!(reason, "unsupported signature type")
        }
        other => panic!("expected a contract error, got {:?}", other),
    }

    let reloaded = ctx.service.get_signature(ctx.tenant, stored.id).await.unwrap();
    assert_eq!(reloaded.status(), VerificationStatus::Pending);
}

/// Empty signature data is refused before anything is stored.
#[tokio::test]
async fn test_store_rejects_empty_signature() {
    let ctx = TestContext::new().await;
    let artifact_id = Uuid::new_v4();
    let signature = NewArtifactSignature::new(
        artifact_id,
        ctx.repository_id,
        SignatureFormat::Binary,
        Vec::new(),
        "pgp",
        SignaturePayload::Pgp(PgpPayload::default()),
    );

    let result = ctx.service.store_signature(&ctx.actor, signature).await;
    assert!(matches!(result, Err(ServiceError::Contract(_))));
    assert!(ctx
        .service
        .get_artifact_signatures(ctx.tenant, artifact_id)
        .await
        .unwrap()
        .is_empty());
}

/// Storing the same id twice fails instead of overwriting.
#[tokio::test]
async fn test_store_never_overwrites() {
    let ctx = TestContext::new().await;
    let mut signature = NewArtifactSignature::new(
        Uuid::new_v4(),
        ctx.repository_id,
        SignatureFormat::Binary,
        ALICE_SIG.to_vec(),
        "pgp",
        SignaturePayload::Pgp(PgpPayload::default()),
    );
    signature.id = Some(Uuid::new_v4());

    let first = ctx
        .service
        .store_signature(&ctx.actor, signature.clone())
        .await
        .unwrap();
    signature.signature_data = BOB_SIG.to_vec();
    let second = ctx.service.store_signature(&ctx.actor, signature).await;

    assert!(second.is_err());
    let stored = ctx.service.get_signature(ctx.tenant, first.id).await.unwrap();
    assert_eq!(stored.signature_data, ALICE_SIG);
}

/// Unconfigured repositories run on the default policy until one is stored.
#[tokio::test]
async fn test_default_and_stored_policy() {
    let ctx = TestContext::new().await;

    let policy = ctx
        .service
        .get_repository_policy(ctx.tenant, ctx.repository_id)
        .await
        .unwrap();
    assert_eq!(policy.signature_policy(), SignaturePolicy::Optional);
    assert!(policy.created_at.is_none());
    assert!(!policy.signature_required());

    let mut settings = required_policy();
    settings.allowed_signers = vec!["alice@example.com".to_string()];
    ctx.service
        .update_repository_policy(&ctx.actor, ctx.repository_id, settings.clone())
        .await
        .unwrap();

    let policy = ctx
        .service
        .get_repository_policy(ctx.tenant, ctx.repository_id)
        .await
        .unwrap();
    assert_eq!(policy.settings, settings);
    assert!(policy.created_at.is_some());
    assert!(policy.signature_required());

    // Policies belong to their tenant.
    let other = ctx
        .service
        .get_repository_policy(depot_trust::TenantId::new_v4(), ctx.repository_id)
        .await
        .unwrap();
    assert!(other.created_at.is_none());
}

/// The allow-list limits which valid signatures open the download gate.
#[tokio::test]
async fn test_download_gate_honours_allowed_signers() {
    let ctx = TestContext::new().await;
    ctx.trust_key(KeyType::Pgp, BOB_ASC).await;
    ctx.service
        .update_repository_policy(
            &ctx.actor,
            ctx.repository_id,
            PolicySettings {
                signature_policy: SignaturePolicy::Strict,
                allowed_signers: vec!["alice@example.com".to_string()],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stored = ctx.store_pgp(SignatureFormat::Binary, BOB_SIG).await;
    let outcome = ctx
        .service
        .verify_signature(&ctx.actor, stored.id, ArtifactInput::from_bytes(ARTIFACT))
        .await
        .unwrap();
    assert_eq!(outcome.status(), VerificationStatus::Valid);

    let denied = ctx
        .service
        .authorize_download(&ctx.actor, ctx.repository_id, stored.artifact_id)
        .await;
    assert!(matches!(
        denied,
        Err(ServiceError::Denied(EnforcementError::SignerNotAllowed))
    ));
}

/// A signer named by the uploader is not stored, so it cannot satisfy the
/// allow-list when verification finds no signer of its own.
#[tokio::test]
async fn test_uploader_named_signer_does_not_open_gate() {
    let ctx = TestContext::new().await;
    ctx.service
        .update_repository_policy(
            &ctx.actor,
            ctx.repository_id,
            PolicySettings {
                signature_policy: SignaturePolicy::Strict,
                allowed_signers: vec!["alice@example.com".to_string()],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let signature = NewArtifactSignature::new(
        Uuid::new_v4(),
        ctx.repository_id,
        SignatureFormat::Binary,
        MALLORY_SIG.to_vec(),
        "pgp",
        SignaturePayload::Pgp(PgpPayload::default()),
    );
    let mut body = serde_json::to_value(&signature).unwrap();
    body["signer_identity"] = serde_json::json!("alice@example.com");
    body["signer_fingerprint"] = serde_json::json!(ALICE_FPR);
    let upload: NewArtifactSignature = serde_json::from_value(body).unwrap();

    let stored = ctx.service.store_signature(&ctx.actor, upload).await.unwrap();
    assert_eq!(stored.signer_identity, None);
    assert_eq!(stored.signer_fingerprint, None);

    let verdict = VerificationResult::pending("pgp").valid();
    let updated = ctx
        .service
        .update_verification_state(ctx.tenant, stored.id, &verdict, ctx.actor.actor_id)
        .await
        .unwrap();
    assert_eq!(updated.status(), VerificationStatus::Valid);
    assert_eq!(updated.signer_identity, None);

    let denied = ctx
        .service
        .authorize_download(&ctx.actor, ctx.repository_id, stored.artifact_id)
        .await;
    assert!(matches!(
        denied,
        Err(ServiceError::Denied(EnforcementError::SignerNotAllowed))
    ));
}

/// With enforcement off, unsigned artifacts are served.
#[tokio::test]
async fn test_download_gate_without_enforcement() {
    let ctx = TestContext::new().await;
    let artifact_id = Uuid::new_v4();

    let denied = ctx
        .service
        .authorize_download(&ctx.actor, ctx.repository_id, artifact_id)
        .await;
    assert!(matches!(
        denied,
        Err(ServiceError::Denied(EnforcementError::NoValidSignature))
    ));

    ctx.service
        .update_repository_policy(
            &ctx.actor,
            ctx.repository_id,
            PolicySettings {
                signature_policy: SignaturePolicy::Disabled,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    ctx.service
        .authorize_download(&ctx.actor, ctx.repository_id, artifact_id)
        .await
        .unwrap();
}

/// Signatures and logs are invisible to other tenants.
#[tokio::test]
async fn test_signatures_are_tenant_scoped() {
    let ctx = TestContext::new().await;
    let stored = ctx.store_pgp(SignatureFormat::Binary, ALICE_SIG).await;

    let other = depot_trust::TenantId::new_v4();
    assert!(matches!(
        ctx.service.get_signature(other, stored.id).await,
        Err(ServiceError::Store(depot_trust::StoreError::NotFound))
    ));
    assert!(ctx
        .service
        .get_artifact_signatures(other, stored.artifact_id)
        .await
        .unwrap()
        .is_empty());
}
