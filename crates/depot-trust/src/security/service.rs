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

//! Orchestration of signature storage, verification and the trust store.
//!
//! Storing a signature, verifying it and logging the attempt are separate
//! operations. The verification state is written first; the audit record is
//! appended afterwards and a failure to append it is reported, not rolled
//! back. A signature left `pending` by a crash is always safe to verify again.

use crate::config::{ConfigError, TrustConfig};
use crate::crypto::{CertificateError, CertificatePool, CryptoError, SpkiPublicKey};
use crate::dal::public_keys::UpsertOutcome;
use crate::dal::DAL;
use crate::error::StoreError;
use crate::models::{
    messages, ActorContext, ArtifactSignature, LogResult, NewArtifactSignature, NewPublicKey,
    NewVerificationLog, PolicySettings, PublicKey, RepositorySignaturePolicy, SignatureType,
    TenantId, VerificationLog, VerificationResult, VerificationStatus,
};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::admin::{AddPublicKeyRequest, AdminError, RevokeKeyRequest, UpdateKeyRequest};
use super::audit;
use super::cosign::CosignVerifier;
use super::enforcement::{self, EnforcementError};
use super::transparency_log::{RekorClient, TransparencyLog, TransparencyLogError};
use super::trust_context::TrustContext;
use super::verifier::{ArtifactInput, SignatureVerifier, VerifyError};

/// Errors from service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    #[error("Key error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Transparency log error: {0}")]
    TransparencyLog(#[from] TransparencyLogError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error("Denied by signature policy: {0}")]
    Denied(#[from] EnforcementError),

    #[error("Signature {id} is {status}; only pending signatures can be verified")]
    NotPending { id: Uuid, status: VerificationStatus },

    #[error("Contract violation: {0}")]
    Contract(String),
}

/// Result of a verification request.
#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    /// The verifier reached a verdict, which was persisted.
    Completed(ArtifactSignature),
    /// The verifier could not reach a verdict. The record is stored as
    /// `untrusted` so it never claims success, and may be re-verified.
    Incomplete {
        signature: ArtifactSignature,
        reason: String,
    },
}

impl VerificationOutcome {
    pub fn signature(&self) -> &ArtifactSignature {
        match self {
            VerificationOutcome::Completed(signature) => signature,
            VerificationOutcome::Incomplete { signature, .. } => signature,
        }
    }

    pub fn status(&self) -> VerificationStatus {
        self.signature().status()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, VerificationOutcome::Completed(_))
    }
}

/// Signature persistence, verification, trust store and policy operations.
///
/// Every operation is scoped to the tenant of the caller's [`ActorContext`]
/// (or an explicit [`TenantId`] for reads).
#[derive(Clone)]
pub struct SignatureService {
    dal: DAL,
    log: Arc<dyn TransparencyLog>,
    ca_pool: Arc<CertificatePool>,
    log_key: Option<SpkiPublicKey>,
}

impl std::fmt::Debug for SignatureService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureService")
            .field("dal", &self.dal)
            .field("ca_pool_empty", &self.ca_pool.is_empty())
            .field("log_key", &self.log_key.as_ref().map(SpkiPublicKey::fingerprint))
            .finish()
    }
}

impl SignatureService {
    pub fn new(
        dal: DAL,
        log: Arc<dyn TransparencyLog>,
        ca_pool: CertificatePool,
        log_key: Option<SpkiPublicKey>,
    ) -> Self {
        Self {
            dal,
            log,
            ca_pool: Arc::new(ca_pool),
            log_key,
        }
    }

    /// Builds a service talking to the configured transparency log.
    pub fn from_config(config: &TrustConfig, dal: DAL) -> Result<Self, ServiceError> {
        let log = RekorClient::new(
            config.transparency_log_url().clone(),
            config.request_timeout(),
        )?;
        let ca_pool = match config.ca_roots_pem() {
            Some(bundle) => CertificatePool::from_pem_bundle(bundle)?,
            None => CertificatePool::default(),
        };
        let log_key = config
            .transparency_log_public_key_pem()
            .map(SpkiPublicKey::from_pem)
            .transpose()?;

        if ca_pool.is_empty() || log_key.is_none() {
            warn!("CA roots or log key not configured; keyless signatures will be untrusted");
        }

        Ok(Self::new(dal, Arc::new(log), ca_pool, log_key))
    }

    pub fn dal(&self) -> &DAL {
        &self.dal
    }

    // ---- signatures ----

    /// Persists a new signature in `pending` state.
    pub async fn store_signature(
        &self,
        actor: &ActorContext,
        signature: NewArtifactSignature,
    ) -> Result<ArtifactSignature, ServiceError> {
        if signature.signature_data.is_empty() {
            return Err(ServiceError::Contract("signature data is empty".to_string()));
        }
        let stored = self
            .dal
            .artifact_signatures()
            .create(actor.tenant_id, signature)
            .await?;

        audit::log_signature_stored(
            actor.tenant_id,
            stored.id,
            stored.artifact_id,
            stored.signature_type().as_str(),
        );
        Ok(stored)
    }

    pub async fn get_signature(
        &self,
        tenant: TenantId,
        id: Uuid,
    ) -> Result<ArtifactSignature, ServiceError> {
        Ok(self.dal.artifact_signatures().get(tenant, id).await?)
    }

    /// Signatures of an artifact, newest first.
    pub async fn get_artifact_signatures(
        &self,
        tenant: TenantId,
        artifact_id: Uuid,
    ) -> Result<Vec<ArtifactSignature>, ServiceError> {
        Ok(self
            .dal
            .artifact_signatures()
            .list_for_artifact(tenant, artifact_id)
            .await?)
    }

    /// Verifies a pending signature and records the verdict.
    ///
    /// The trust context is loaded from the store for this call only, so trust
    /// changes apply to every verification that starts after them.
    pub async fn verify_signature(
        &self,
        actor: &ActorContext,
        signature_id: Uuid,
        artifact: ArtifactInput<'_>,
    ) -> Result<VerificationOutcome, ServiceError> {
        let tenant = actor.tenant_id;
        let signature = self.get_signature(tenant, signature_id).await?;
        if signature.status() != VerificationStatus::Pending {
            return Err(ServiceError::NotPending {
                id: signature_id,
                status: signature.status(),
            });
        }

        let policy = self
            .get_repository_policy(tenant, signature.repository_id)
            .await?;
        let signature_type = signature.signature_type();
        let now = Utc::now();

        let verdict = if !policy.scheme_enabled(signature_type) {
            Ok(VerificationResult::pending(signature_type.as_str())
                .untrusted(messages::SCHEME_DISABLED))
        } else if signature.is_expired_at(now) {
            Ok(VerificationResult::pending(signature_type.as_str())
                .expired(messages::SIGNATURE_EXPIRED))
        } else {
            let trust =
                TrustContext::load(&self.dal, tenant, Some(signature.repository_id), now).await?;
            debug!(
                signature_id = %signature_id,
                trusted_keys = trust.keys().len(),
                "Verifying signature"
            );
            self.run_verifier(&signature, artifact, trust).await?
        };

        match verdict {
            Ok(result) => {
                let updated = self
                    .update_verification_state(tenant, signature_id, &result, actor.actor_id)
                    .await?;
                let log_result = if result.verified {
                    audit::log_verification_success(
                        tenant,
                        signature_id,
                        &result.verification_method,
                        result.signer_fingerprint.as_deref(),
                        result.signer_identity.as_deref(),
                    );
                    LogResult::Success
                } else {
                    audit::log_verification_failure(
                        tenant,
                        signature_id,
                        result.status,
                        result.error_message.as_deref().unwrap_or_default(),
                        result.signer_fingerprint.as_deref(),
                    );
                    LogResult::Failure
                };
                self.log_verification_attempt(actor, &updated, &result, log_result)
                    .await;
                Ok(VerificationOutcome::Completed(updated))
            }
            Err(reason) => {
                let result = VerificationResult::pending(incomplete_method(signature_type))
                    .untrusted(messages::LOG_UNAVAILABLE);
                let updated = self
                    .update_verification_state(tenant, signature_id, &result, actor.actor_id)
                    .await?;
                audit::log_verification_incomplete(tenant, signature_id, &reason);
                self.log_verification_attempt(actor, &updated, &result, LogResult::Incomplete)
                    .await;
                Ok(VerificationOutcome::Incomplete {
                    signature: updated,
                    reason,
                })
            }
        }
    }

    /// Returns a signature to `pending` and verifies it again.
    pub async fn reverify_signature(
        &self,
        actor: &ActorContext,
        signature_id: Uuid,
        artifact: ArtifactInput<'_>,
    ) -> Result<VerificationOutcome, ServiceError> {
        self.dal
            .artifact_signatures()
            .reset_to_pending(actor.tenant_id, signature_id)
            .await?;
        info!(signature_id = %signature_id, "Re-verifying signature");
        self.verify_signature(actor, signature_id, artifact).await
    }

    /// Runs the scheme's verifier. The inner `Err` carries the reason a
    /// verdict could not be reached.
    async fn run_verifier(
        &self,
        signature: &ArtifactSignature,
        artifact: ArtifactInput<'_>,
        trust: TrustContext,
    ) -> Result<Result<VerificationResult, String>, ServiceError> {
        let verified = match signature.signature_type() {
            SignatureType::Pgp => trust.pgp_verifier().verify(signature, artifact).await,
            SignatureType::Cosign => {
                CosignVerifier::new(self.log.clone(), self.ca_pool.clone(), self.log_key.clone())
                    .with_trust_context(trust)
                    .verify(signature, artifact)
                    .await
            }
            SignatureType::Sigstore => {
                return Err(ServiceError::Contract("unsupported signature type".to_string()))
            }
        };

        match verified {
            Ok(result) => Ok(Ok(result)),
            Err(VerifyError::Unavailable(e)) => Ok(Err(e.to_string())),
            Err(VerifyError::ContractViolation(reason)) => Err(ServiceError::Contract(reason)),
        }
    }

    /// Records a verdict on a pending signature.
    ///
    /// Signer details are only overwritten by non-empty values.
    pub async fn update_verification_state(
        &self,
        tenant: TenantId,
        signature_id: Uuid,
        result: &VerificationResult,
        verified_by: Option<Uuid>,
    ) -> Result<ArtifactSignature, ServiceError> {
        Ok(self
            .dal
            .artifact_signatures()
            .update_verification(
                tenant,
                signature_id,
                VerificationStatus::Pending,
                result,
                verified_by,
            )
            .await?)
    }

    /// Appends an audit record for a verification attempt.
    ///
    /// Best effort: a failed write is reported on the error channel and
    /// returns `None`; the verification state already written stands.
    pub async fn log_verification_attempt(
        &self,
        actor: &ActorContext,
        signature: &ArtifactSignature,
        result: &VerificationResult,
        outcome: LogResult,
    ) -> Option<VerificationLog> {
        let entry = NewVerificationLog {
            artifact_id: signature.artifact_id,
            signature_id: Some(signature.id),
            verification_type: signature.signature_type().as_str().to_string(),
            verification_result: outcome,
            verification_status: result.status,
            verification_method: Some(result.verification_method.clone()),
            error_code: result.error_code().map(str::to_string),
            error_message: result.error_message.clone(),
            actor_id: actor.actor_id,
            client_ip: actor.client_ip.clone(),
            user_agent: actor.user_agent.clone(),
        };

        match self
            .dal
            .verification_logs()
            .append(actor.tenant_id, entry)
            .await
        {
            Ok(log) => Some(log),
            Err(e) => {
                audit::log_verification_log_write_failed(
                    actor.tenant_id,
                    signature.id,
                    &e.to_string(),
                );
                None
            }
        }
    }

    /// Audit records of a signature, newest first.
    pub async fn list_verification_logs(
        &self,
        tenant: TenantId,
        signature_id: Uuid,
    ) -> Result<Vec<VerificationLog>, ServiceError> {
        Ok(self
            .dal
            .verification_logs()
            .list_for_signature(tenant, signature_id)
            .await?)
    }

    // ---- policies ----

    /// The policy in effect; the default policy when none is stored.
    pub async fn get_repository_policy(
        &self,
        tenant: TenantId,
        repository_id: Uuid,
    ) -> Result<RepositorySignaturePolicy, ServiceError> {
        Ok(self
            .dal
            .repository_policies()
            .get(tenant, repository_id)
            .await?
            .unwrap_or_else(|| RepositorySignaturePolicy::default_for(tenant, repository_id)))
    }

    pub async fn update_repository_policy(
        &self,
        actor: &ActorContext,
        repository_id: Uuid,
        settings: PolicySettings,
    ) -> Result<RepositorySignaturePolicy, ServiceError> {
        let policy = self
            .dal
            .repository_policies()
            .upsert(actor.tenant_id, repository_id, settings)
            .await?;
        audit::log_policy_updated(
            actor.tenant_id,
            repository_id,
            policy.signature_policy().as_str(),
            policy.settings.signature_verification_enabled,
        );
        Ok(policy)
    }

    // ---- gates ----

    /// Rejects an upload that lacks a required signature.
    pub async fn check_upload(
        &self,
        actor: &ActorContext,
        repository_id: Uuid,
        has_signature: bool,
    ) -> Result<(), ServiceError> {
        let policy = self
            .get_repository_policy(actor.tenant_id, repository_id)
            .await?;
        enforcement::check_upload(&policy, has_signature).map_err(|e| {
            audit::log_upload_rejected(actor.tenant_id, repository_id, e.code());
            ServiceError::Denied(e)
        })
    }

    /// Decides whether an artifact may be served.
    pub async fn authorize_download(
        &self,
        actor: &ActorContext,
        repository_id: Uuid,
        artifact_id: Uuid,
    ) -> Result<(), ServiceError> {
        let policy = self
            .get_repository_policy(actor.tenant_id, repository_id)
            .await?;
        if !policy.verification_enforced() {
            return Ok(());
        }

        let signatures: Vec<ArtifactSignature> = self
            .get_artifact_signatures(actor.tenant_id, artifact_id)
            .await?
            .into_iter()
            .filter(|s| s.repository_id == repository_id)
            .collect();

        enforcement::check_download(&policy, &signatures).map_err(|e| {
            audit::log_download_denied(actor.tenant_id, repository_id, artifact_id, e.code());
            ServiceError::Denied(e)
        })
    }

    // ---- trust store ----

    /// Inserts a key or refreshes the one with the same fingerprint.
    pub async fn store_public_key(
        &self,
        actor: &ActorContext,
        key: NewPublicKey,
    ) -> Result<PublicKey, ServiceError> {
        let (stored, outcome) = self.dal.public_keys().upsert(actor.tenant_id, key).await?;
        match outcome {
            UpsertOutcome::Inserted => audit::log_trusted_key_added(
                actor.tenant_id,
                stored.id,
                &stored.fingerprint,
                Some(&stored.name),
                stored.trusted,
            ),
            UpsertOutcome::Updated => audit::log_trusted_key_updated(
                actor.tenant_id,
                stored.id,
                &stored.fingerprint,
                stored.trusted,
                stored.enabled,
            ),
        }
        Ok(stored)
    }

    /// Parses key material from an administrative request and stores it.
    pub async fn add_public_key(
        &self,
        actor: &ActorContext,
        request: AddPublicKeyRequest,
    ) -> Result<PublicKey, ServiceError> {
        let key = request.into_new_key()?;
        self.store_public_key(actor, key).await
    }

    /// Keys usable now for the repository (or tenant-wide keys only), newest first.
    pub async fn get_trusted_keys(
        &self,
        tenant: TenantId,
        repository_id: Option<Uuid>,
    ) -> Result<Vec<PublicKey>, ServiceError> {
        Ok(self
            .dal
            .public_keys()
            .usable(tenant, repository_id, None, Utc::now())
            .await?)
    }

    /// Every key of the tenant in any state, newest first.
    pub async fn list_public_keys(&self, tenant: TenantId) -> Result<Vec<PublicKey>, ServiceError> {
        Ok(self.dal.public_keys().list(tenant).await?)
    }

    pub async fn get_public_key(
        &self,
        tenant: TenantId,
        key_id: Uuid,
    ) -> Result<PublicKey, ServiceError> {
        Ok(self.dal.public_keys().get(tenant, key_id).await?)
    }

    /// Revokes a key. Signatures verified earlier keep their state until re-verified.
    pub async fn revoke_public_key(
        &self,
        actor: &ActorContext,
        key_id: Uuid,
        request: RevokeKeyRequest,
    ) -> Result<PublicKey, ServiceError> {
        let key = self
            .dal
            .public_keys()
            .revoke(actor.tenant_id, key_id, request.reason)
            .await?;
        audit::log_key_revoked(
            actor.tenant_id,
            key.id,
            &key.fingerprint,
            key.revocation_reason.as_deref(),
        );
        Ok(key)
    }

    pub async fn set_key_enabled(
        &self,
        actor: &ActorContext,
        key_id: Uuid,
        enabled: bool,
    ) -> Result<PublicKey, ServiceError> {
        let key = self
            .dal
            .public_keys()
            .set_enabled(actor.tenant_id, key_id, enabled)
            .await?;
        audit::log_trusted_key_updated(
            actor.tenant_id,
            key.id,
            &key.fingerprint,
            key.trusted,
            key.enabled,
        );
        Ok(key)
    }

    pub async fn set_key_trusted(
        &self,
        actor: &ActorContext,
        key_id: Uuid,
        trusted: bool,
    ) -> Result<PublicKey, ServiceError> {
        let key = self
            .dal
            .public_keys()
            .set_trusted(actor.tenant_id, key_id, trusted)
            .await?;
        audit::log_trusted_key_updated(
            actor.tenant_id,
            key.id,
            &key.fingerprint,
            key.trusted,
            key.enabled,
        );
        Ok(key)
    }

    /// Applies an [`UpdateKeyRequest`]; absent fields are left alone.
    pub async fn update_public_key(
        &self,
        actor: &ActorContext,
        key_id: Uuid,
        request: UpdateKeyRequest,
    ) -> Result<PublicKey, ServiceError> {
        let mut key = self.get_public_key(actor.tenant_id, key_id).await?;
        if let Some(trusted) = request.trusted {
            key = self.set_key_trusted(actor, key_id, trusted).await?;
        }
        if let Some(enabled) = request.enabled {
            key = self.set_key_enabled(actor, key_id, enabled).await?;
        }
        Ok(key)
    }
}

fn incomplete_method(signature_type: SignatureType) -> &'static str {
    match signature_type {
        SignatureType::Cosign => "cosign-keyless",
        other => other.as_str(),
    }
}
