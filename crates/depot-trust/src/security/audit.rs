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

//! Security audit logging for the trust subsystem.
//!
//! Every verification attempt, trust-store change, policy change and gate
//! denial is emitted as a structured `tracing` event carrying an
//! `event_type` field from [`events`], so a SIEM can select on it.

use crate::models::{TenantId, VerificationStatus};
use uuid::Uuid;

/// Event types.
pub mod events {
    /// Signature stored event type.
    pub const SIGNATURE_STORED: &str = "signature.stored";

    /// Verification success event type.
    pub const VERIFICATION_SUCCESS: &str = "verification.success";
    /// Verification failure event type.
    pub const VERIFICATION_FAILURE: &str = "verification.failure";
    /// Verification could not be completed event type.
    pub const VERIFICATION_INCOMPLETE: &str = "verification.incomplete";
    /// Verification log write failure event type.
    pub const VERIFICATION_LOG_WRITE_FAILED: &str = "verification.log_write_failed";

    /// Trusted key added event type.
    pub const KEY_TRUSTED_ADDED: &str = "key.trusted.added";
    /// Trusted key updated event type.
    pub const KEY_TRUSTED_UPDATED: &str = "key.trusted.updated";
    /// Key revoked event type.
    pub const KEY_REVOKED: &str = "key.revoked";

    /// Repository policy updated event type.
    pub const POLICY_UPDATED: &str = "policy.updated";

    /// Upload rejected event type.
    pub const UPLOAD_REJECTED: &str = "upload.rejected";
    /// Download denied event type.
    pub const DOWNLOAD_DENIED: &str = "download.denied";
}

/// Log a stored signature.
pub fn log_signature_stored(
    tenant_id: TenantId,
    signature_id: Uuid,
    artifact_id: Uuid,
    signature_type: &str,
) {
    tracing::info!(
        event_type = events::SIGNATURE_STORED,
        tenant_id = %tenant_id,
        signature_id = %signature_id,
        artifact_id = %artifact_id,
        signature_type = %signature_type,
        "Signature stored"
    );
}

/// Log a verification success event.
pub fn log_verification_success(
    tenant_id: TenantId,
    signature_id: Uuid,
    method: &str,
    signer_fingerprint: Option<&str>,
    signer_identity: Option<&str>,
) {
    tracing::info!(
        event_type = events::VERIFICATION_SUCCESS,
        tenant_id = %tenant_id,
        signature_id = %signature_id,
        method = %method,
        signer_fingerprint = signer_fingerprint.unwrap_or("<unknown>"),
        signer_identity = signer_identity.unwrap_or("<unknown>"),
        "Signature verified successfully"
    );
}

/// Log a verification failure event.
pub fn log_verification_failure(
    tenant_id: TenantId,
    signature_id: Uuid,
    status: VerificationStatus,
    failure_reason: &str,
    signer_fingerprint: Option<&str>,
) {
    tracing::warn!(
        event_type = events::VERIFICATION_FAILURE,
        tenant_id = %tenant_id,
        signature_id = %signature_id,
        status = %status,
        failure_reason = %failure_reason,
        signer_fingerprint = signer_fingerprint.unwrap_or("<unknown>"),
        "Signature verification failed"
    );
}

/// Log a verification that could not be completed.
pub fn log_verification_incomplete(tenant_id: TenantId, signature_id: Uuid, reason: &str) {
    tracing::warn!(
        event_type = events::VERIFICATION_INCOMPLETE,
        tenant_id = %tenant_id,
        signature_id = %signature_id,
        reason = %reason,
        "Signature verification incomplete"
    );
}

/// Log a failed audit-record write. The verification state was already saved.
pub fn log_verification_log_write_failed(tenant_id: TenantId, signature_id: Uuid, error: &str) {
    tracing::error!(
        event_type = events::VERIFICATION_LOG_WRITE_FAILED,
        tenant_id = %tenant_id,
        signature_id = %signature_id,
        error = %error,
        "Failed to write verification log"
    );
}

/// Log a key added to the trust store.
pub fn log_trusted_key_added(
    tenant_id: TenantId,
    key_id: Uuid,
    key_fingerprint: &str,
    key_name: Option<&str>,
    trusted: bool,
) {
    tracing::warn!(
        event_type = events::KEY_TRUSTED_ADDED,
        tenant_id = %tenant_id,
        key_id = %key_id,
        key_fingerprint = %key_fingerprint,
        key_name = key_name.unwrap_or("<unnamed>"),
        trusted = trusted,
        "Trusted key added"
    );
}

/// Log a trust-store key change other than revocation.
pub fn log_trusted_key_updated(
    tenant_id: TenantId,
    key_id: Uuid,
    key_fingerprint: &str,
    trusted: bool,
    enabled: bool,
) {
    tracing::warn!(
        event_type = events::KEY_TRUSTED_UPDATED,
        tenant_id = %tenant_id,
        key_id = %key_id,
        key_fingerprint = %key_fingerprint,
        trusted = trusted,
        enabled = enabled,
        "Trusted key updated"
    );
}

/// Log a key revocation.
pub fn log_key_revoked(
    tenant_id: TenantId,
    key_id: Uuid,
    key_fingerprint: &str,
    reason: Option<&str>,
) {
    tracing::warn!(
        event_type = events::KEY_REVOKED,
        tenant_id = %tenant_id,
        key_id = %key_id,
        key_fingerprint = %key_fingerprint,
        reason = reason.unwrap_or("<none>"),
        "Key revoked"
    );
}

/// Log a repository policy change.
pub fn log_policy_updated(
    tenant_id: TenantId,
    repository_id: Uuid,
    signature_policy: &str,
    verification_enabled: bool,
) {
    tracing::info!(
        event_type = events::POLICY_UPDATED,
        tenant_id = %tenant_id,
        repository_id = %repository_id,
        signature_policy = %signature_policy,
        verification_enabled = verification_enabled,
        "Repository signature policy updated"
    );
}

/// Log an upload rejected by policy.
pub fn log_upload_rejected(tenant_id: TenantId, repository_id: Uuid, reason: &str) {
    tracing::warn!(
        event_type = events::UPLOAD_REJECTED,
        tenant_id = %tenant_id,
        repository_id = %repository_id,
        reason = %reason,
        "Upload rejected by signature policy"
    );
}

/// Log a download denied by policy.
pub fn log_download_denied(
    tenant_id: TenantId,
    repository_id: Uuid,
    artifact_id: Uuid,
    reason: &str,
) {
    tracing::warn!(
        event_type = events::DOWNLOAD_DENIED,
        tenant_id = %tenant_id,
        repository_id = %repository_id,
        artifact_id = %artifact_id,
        reason = %reason,
        "Download denied by signature policy"
    );
}
