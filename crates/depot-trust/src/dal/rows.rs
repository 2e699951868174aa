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

//! SQLite row models for the trust tables.
//!
//! Rows hold storage-native types (BLOB UUIDs, TEXT timestamps, INTEGER
//! booleans). Conversion to domain types is fallible: a row that cannot be
//! decoded surfaces as [`StoreError::Corrupt`] rather than a panic.

use crate::database::codec::{blob_to_uuid, int_to_bool, text_to_timestamp};
use crate::database::schema::{
    artifact_signatures, public_keys, repository_signature_policies, verification_logs,
};
use crate::error::StoreError;
use crate::models::{
    ArtifactSignature, PolicySettings, PublicKey, RepositorySignaturePolicy, SignaturePayload,
    TenantId, VerificationLog, VerificationState,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

fn uuid(table: &'static str, blob: &[u8]) -> Result<Uuid, StoreError> {
    blob_to_uuid(blob).map_err(|e| StoreError::corrupt(table, e))
}

fn opt_uuid(table: &'static str, blob: Option<&[u8]>) -> Result<Option<Uuid>, StoreError> {
    blob.map(|b| uuid(table, b)).transpose()
}

fn ts(table: &'static str, text: &str) -> Result<DateTime<Utc>, StoreError> {
    text_to_timestamp(text).map_err(|e| StoreError::corrupt(table, e))
}

fn opt_ts(table: &'static str, text: Option<&str>) -> Result<Option<DateTime<Utc>>, StoreError> {
    text.map(|t| ts(table, t)).transpose()
}

// ============================================================================
// Artifact signatures
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = artifact_signatures)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SignatureRow {
    pub id: Vec<u8>,
    pub tenant_id: Vec<u8>,
    pub artifact_id: Vec<u8>,
    pub repository_id: Vec<u8>,
    pub signature_type: String,
    pub signature_format: String,
    pub signature_data: Vec<u8>,
    pub signature_algorithm: String,
    pub signer_identity: Option<String>,
    pub signer_fingerprint: Option<String>,
    pub public_key: Option<String>,
    pub scheme_payload: String,
    pub verified: i32,
    pub verification_status: String,
    pub verification_method: Option<String>,
    pub verification_error: Option<String>,
    pub verified_at: Option<String>,
    pub verified_by: Option<Vec<u8>>,
    pub signed_at: Option<String>,
    pub uploaded_at: String,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = artifact_signatures)]
pub struct NewSignatureRow {
    pub id: Vec<u8>,
    pub tenant_id: Vec<u8>,
    pub artifact_id: Vec<u8>,
    pub repository_id: Vec<u8>,
    pub signature_type: String,
    pub signature_format: String,
    pub signature_data: Vec<u8>,
    pub signature_algorithm: String,
    pub signer_identity: Option<String>,
    pub signer_fingerprint: Option<String>,
    pub public_key: Option<String>,
    pub scheme_payload: String,
    pub verified: i32,
    pub verification_status: String,
    pub signed_at: Option<String>,
    pub uploaded_at: String,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Verification-state update. `None` on a signer field leaves the stored
/// value untouched; the nested options write NULL when `Some(None)`.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = artifact_signatures)]
pub struct VerificationChangeset {
    pub verified: i32,
    pub verification_status: String,
    pub verification_method: Option<Option<String>>,
    pub verification_error: Option<Option<String>>,
    pub verified_at: Option<Option<String>>,
    pub verified_by: Option<Option<Vec<u8>>>,
    pub signer_identity: Option<String>,
    pub signer_fingerprint: Option<String>,
    pub updated_at: String,
}

impl TryFrom<SignatureRow> for ArtifactSignature {
    type Error = StoreError;

    fn try_from(row: SignatureRow) -> Result<Self, Self::Error> {
        const T: &str = "artifact_signatures";
        let signature_type = row
            .signature_type
            .parse()
            .map_err(|e| StoreError::corrupt(T, e))?;
        let payload = SignaturePayload::from_json(signature_type, &row.scheme_payload)
            .map_err(|e| StoreError::corrupt(T, e))?;

        Ok(ArtifactSignature {
            id: uuid(T, &row.id)?,
            tenant_id: TenantId(uuid(T, &row.tenant_id)?),
            artifact_id: uuid(T, &row.artifact_id)?,
            repository_id: uuid(T, &row.repository_id)?,
            signature_format: row
                .signature_format
                .parse()
                .map_err(|e| StoreError::corrupt(T, e))?,
            signature_data: row.signature_data,
            signature_algorithm: row.signature_algorithm,
            signer_identity: row.signer_identity,
            signer_fingerprint: row.signer_fingerprint,
            public_key: row.public_key,
            payload,
            verification: VerificationState {
                verified: int_to_bool(row.verified),
                status: row
                    .verification_status
                    .parse()
                    .map_err(|e| StoreError::corrupt(T, e))?,
                method: row.verification_method,
                error: row.verification_error,
                verified_at: opt_ts(T, row.verified_at.as_deref())?,
                verified_by: opt_uuid(T, row.verified_by.as_deref())?,
            },
            signed_at: opt_ts(T, row.signed_at.as_deref())?,
            uploaded_at: ts(T, &row.uploaded_at)?,
            expires_at: opt_ts(T, row.expires_at.as_deref())?,
            created_at: ts(T, &row.created_at)?,
            updated_at: ts(T, &row.updated_at)?,
        })
    }
}

// ============================================================================
// Public keys
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = public_keys)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PublicKeyRow {
    pub id: Vec<u8>,
    pub tenant_id: Vec<u8>,
    pub repository_id: Option<Vec<u8>>,
    pub key_type: String,
    pub fingerprint: String,
    pub key_id: String,
    pub algorithm: String,
    pub key_size: Option<i32>,
    pub key_material: String,
    pub name: String,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub organization: Option<String>,
    pub description: Option<String>,
    pub key_source: String,
    pub source_url: Option<String>,
    pub trusted: i32,
    pub enabled: i32,
    pub revoked: i32,
    pub revoked_at: Option<String>,
    pub revocation_reason: Option<String>,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = public_keys)]
pub struct NewPublicKeyRow {
    pub id: Vec<u8>,
    pub tenant_id: Vec<u8>,
    pub repository_id: Option<Vec<u8>>,
    pub key_type: String,
    pub fingerprint: String,
    pub key_id: String,
    pub algorithm: String,
    pub key_size: Option<i32>,
    pub key_material: String,
    pub name: String,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub organization: Option<String>,
    pub description: Option<String>,
    pub key_source: String,
    pub source_url: Option<String>,
    pub trusted: i32,
    pub enabled: i32,
    pub revoked: i32,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields refreshed when an existing key is added again. Identity, creation
/// time and revocation state are not part of it.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = public_keys)]
#[diesel(treat_none_as_null = true)]
pub struct PublicKeyRefresh {
    pub repository_id: Option<Vec<u8>>,
    pub key_id: String,
    pub algorithm: String,
    pub key_size: Option<i32>,
    pub key_material: String,
    pub name: String,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub organization: Option<String>,
    pub description: Option<String>,
    pub key_source: String,
    pub source_url: Option<String>,
    pub trusted: i32,
    pub enabled: i32,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub updated_at: String,
}

impl TryFrom<PublicKeyRow> for PublicKey {
    type Error = StoreError;

    fn try_from(row: PublicKeyRow) -> Result<Self, Self::Error> {
        const T: &str = "public_keys";
        Ok(PublicKey {
            id: uuid(T, &row.id)?,
            tenant_id: TenantId(uuid(T, &row.tenant_id)?),
            repository_id: opt_uuid(T, row.repository_id.as_deref())?,
            key_type: row.key_type.parse().map_err(|e| StoreError::corrupt(T, e))?,
            fingerprint: row.fingerprint,
            key_id: row.key_id,
            algorithm: row.algorithm,
            key_size: row.key_size,
            key_material: row.key_material,
            name: row.name,
            owner_name: row.owner_name,
            owner_email: row.owner_email,
            organization: row.organization,
            description: row.description,
            key_source: row
                .key_source
                .parse()
                .map_err(|e| StoreError::corrupt(T, e))?,
            source_url: row.source_url,
            trusted: int_to_bool(row.trusted),
            enabled: int_to_bool(row.enabled),
            revoked: int_to_bool(row.revoked),
            revoked_at: opt_ts(T, row.revoked_at.as_deref())?,
            revocation_reason: row.revocation_reason,
            valid_from: opt_ts(T, row.valid_from.as_deref())?,
            valid_until: opt_ts(T, row.valid_until.as_deref())?,
            created_at: ts(T, &row.created_at)?,
            updated_at: ts(T, &row.updated_at)?,
        })
    }
}

// ============================================================================
// Repository policies
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = repository_signature_policies)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PolicyRow {
    pub tenant_id: Vec<u8>,
    pub repository_id: Vec<u8>,
    pub signature_policy: String,
    pub verification_enabled: i32,
    pub cosign_enabled: i32,
    pub pgp_enabled: i32,
    pub sigstore_enabled: i32,
    pub allowed_signers: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = repository_signature_policies)]
pub struct NewPolicyRow {
    pub tenant_id: Vec<u8>,
    pub repository_id: Vec<u8>,
    pub signature_policy: String,
    pub verification_enabled: i32,
    pub cosign_enabled: i32,
    pub pgp_enabled: i32,
    pub sigstore_enabled: i32,
    pub allowed_signers: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = repository_signature_policies)]
pub struct PolicyChangeset {
    pub signature_policy: String,
    pub verification_enabled: i32,
    pub cosign_enabled: i32,
    pub pgp_enabled: i32,
    pub sigstore_enabled: i32,
    pub allowed_signers: String,
    pub updated_at: String,
}

impl TryFrom<PolicyRow> for RepositorySignaturePolicy {
    type Error = StoreError;

    fn try_from(row: PolicyRow) -> Result<Self, Self::Error> {
        const T: &str = "repository_signature_policies";
        Ok(RepositorySignaturePolicy {
            tenant_id: TenantId(uuid(T, &row.tenant_id)?),
            repository_id: uuid(T, &row.repository_id)?,
            settings: PolicySettings {
                signature_policy: row
                    .signature_policy
                    .parse()
                    .map_err(|e| StoreError::corrupt(T, e))?,
                signature_verification_enabled: int_to_bool(row.verification_enabled),
                cosign_enabled: int_to_bool(row.cosign_enabled),
                pgp_enabled: int_to_bool(row.pgp_enabled),
                sigstore_enabled: int_to_bool(row.sigstore_enabled),
                allowed_signers: serde_json::from_str(&row.allowed_signers)
                    .map_err(|e| StoreError::corrupt(T, e))?,
            },
            created_at: Some(ts(T, &row.created_at)?),
            updated_at: Some(ts(T, &row.updated_at)?),
        })
    }
}

// ============================================================================
// Verification logs
// ============================================================================

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = verification_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct VerificationLogRow {
    pub id: Vec<u8>,
    pub tenant_id: Vec<u8>,
    pub artifact_id: Vec<u8>,
    pub signature_id: Option<Vec<u8>>,
    pub verification_type: String,
    pub verification_result: String,
    pub verification_status: String,
    pub verification_method: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub actor_id: Option<Vec<u8>>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

impl TryFrom<VerificationLogRow> for VerificationLog {
    type Error = StoreError;

    fn try_from(row: VerificationLogRow) -> Result<Self, Self::Error> {
        const T: &str = "verification_logs";
        Ok(VerificationLog {
            id: uuid(T, &row.id)?,
            tenant_id: TenantId(uuid(T, &row.tenant_id)?),
            artifact_id: uuid(T, &row.artifact_id)?,
            signature_id: opt_uuid(T, row.signature_id.as_deref())?,
            verification_type: row.verification_type,
            verification_result: row
                .verification_result
                .parse()
                .map_err(|e| StoreError::corrupt(T, e))?,
            verification_status: row
                .verification_status
                .parse()
                .map_err(|e| StoreError::corrupt(T, e))?,
            verification_method: row.verification_method,
            error_code: row.error_code,
            error_message: row.error_message,
            actor_id: opt_uuid(T, row.actor_id.as_deref())?,
            client_ip: row.client_ip,
            user_agent: row.user_agent,
            created_at: ts(T, &row.created_at)?,
        })
    }
}
