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

//! Artifact signature records.
//!
//! A record is written once. Afterwards only the verification-state columns
//! and `updated_at` change, and only through [`ArtifactSignatureDAL::update_verification`]
//! or [`ArtifactSignatureDAL::reset_to_pending`].

use super::rows::{NewSignatureRow, SignatureRow, VerificationChangeset};
use super::DAL;
use crate::database::codec::{bool_to_int, now, timestamp_to_text, uuid_to_blob};
use crate::database::schema::artifact_signatures;
use crate::error::StoreError;
use crate::models::{
    ArtifactSignature, NewArtifactSignature, TenantId, VerificationResult, VerificationStatus,
};
use diesel::prelude::*;
use uuid::Uuid;

pub struct ArtifactSignatureDAL<'a> {
    pub dal: &'a DAL,
}

impl<'a> ArtifactSignatureDAL<'a> {
    /// Inserts a new signature in `pending` state.
    ///
    /// Fails with [`StoreError::Conflict`] when the id is already taken.
    pub async fn create(
        &self,
        tenant: TenantId,
        new_signature: NewArtifactSignature,
    ) -> Result<ArtifactSignature, StoreError> {
        let conn = self.dal.conn().await?;

        let id = new_signature.id.unwrap_or_else(Uuid::new_v4);
        let now = timestamp_to_text(&now());
        let scheme_payload = new_signature
            .payload
            .to_json()
            .map_err(|e| StoreError::Database(format!("unencodable scheme payload: {}", e)))?;

        let row = NewSignatureRow {
            id: uuid_to_blob(&id),
            tenant_id: uuid_to_blob(&tenant.0),
            artifact_id: uuid_to_blob(&new_signature.artifact_id),
            repository_id: uuid_to_blob(&new_signature.repository_id),
            signature_type: new_signature.signature_type().as_str().to_string(),
            signature_format: new_signature.signature_format.as_str().to_string(),
            signature_data: new_signature.signature_data,
            signature_algorithm: new_signature.signature_algorithm,
            signer_identity: None,
            signer_fingerprint: None,
            public_key: new_signature.public_key,
            scheme_payload,
            verified: bool_to_int(false),
            verification_status: VerificationStatus::Pending.as_str().to_string(),
            signed_at: new_signature.signed_at.as_ref().map(timestamp_to_text),
            uploaded_at: now.clone(),
            expires_at: new_signature.expires_at.as_ref().map(timestamp_to_text),
            created_at: now.clone(),
            updated_at: now,
        };

        let tenant_blob = uuid_to_blob(&tenant.0);
        let id_blob = uuid_to_blob(&id);
        let stored: SignatureRow = conn
            .interact(move |conn| -> Result<SignatureRow, StoreError> {
                diesel::insert_into(artifact_signatures::table)
                    .values(&row)
                    .execute(conn)?;
                Ok(artifact_signatures::table
                    .filter(artifact_signatures::tenant_id.eq(&tenant_blob))
                    .filter(artifact_signatures::id.eq(&id_blob))
                    .select(SignatureRow::as_select())
                    .first(conn)?)
            })
            .await??;

        stored.try_into()
    }

    /// Fetches one signature of the tenant.
    pub async fn get(&self, tenant: TenantId, id: Uuid) -> Result<ArtifactSignature, StoreError> {
        let conn = self.dal.conn().await?;

        let tenant_blob = uuid_to_blob(&tenant.0);
        let id_blob = uuid_to_blob(&id);
        let row: SignatureRow = conn
            .interact(move |conn| {
                artifact_signatures::table
                    .filter(artifact_signatures::tenant_id.eq(&tenant_blob))
                    .filter(artifact_signatures::id.eq(&id_blob))
                    .select(SignatureRow::as_select())
                    .first(conn)
            })
            .await??;

        row.try_into()
    }

    /// All signatures of an artifact, newest first.
    pub async fn list_for_artifact(
        &self,
        tenant: TenantId,
        artifact_id: Uuid,
    ) -> Result<Vec<ArtifactSignature>, StoreError> {
        let conn = self.dal.conn().await?;

        let tenant_blob = uuid_to_blob(&tenant.0);
        let artifact_blob = uuid_to_blob(&artifact_id);
        let rows: Vec<SignatureRow> = conn
            .interact(move |conn| {
                artifact_signatures::table
                    .filter(artifact_signatures::tenant_id.eq(&tenant_blob))
                    .filter(artifact_signatures::artifact_id.eq(&artifact_blob))
                    .order(artifact_signatures::created_at.desc())
                    .select(SignatureRow::as_select())
                    .load(conn)
            })
            .await??;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Writes the outcome of a verification.
    ///
    /// The update applies only while the record is in `expected` state, which
    /// keeps terminal states from being overwritten without a reset. Signer
    /// identity and fingerprint are only replaced by non-empty values.
    pub async fn update_verification(
        &self,
        tenant: TenantId,
        id: Uuid,
        expected: VerificationStatus,
        result: &VerificationResult,
        verified_by: Option<Uuid>,
    ) -> Result<ArtifactSignature, StoreError> {
        if !expected.can_transition_to(result.status) {
            return Err(StoreError::Conflict(format!(
                "cannot move signature from {} to {}",
                expected, result.status
            )));
        }

        let now = timestamp_to_text(&now());
        let changeset = VerificationChangeset {
            verified: bool_to_int(result.verified),
            verification_status: result.status.as_str().to_string(),
            verification_method: Some(Some(result.verification_method.clone())),
            verification_error: Some(result.error_message.clone()),
            verified_at: Some(Some(now.clone())),
            verified_by: Some(verified_by.as_ref().map(uuid_to_blob)),
            signer_identity: non_empty(result.signer_identity.as_deref()),
            signer_fingerprint: non_empty(result.signer_fingerprint.as_deref()),
            updated_at: now,
        };

        self.apply(tenant, id, expected, changeset).await
    }

    /// Returns a signature to `pending` ahead of re-verification.
    ///
    /// Previously recorded signer details are kept.
    pub async fn reset_to_pending(
        &self,
        tenant: TenantId,
        id: Uuid,
    ) -> Result<ArtifactSignature, StoreError> {
        let current = self.get(tenant, id).await?;
        if current.status() == VerificationStatus::Pending {
            return Ok(current);
        }

        let changeset = VerificationChangeset {
            verified: bool_to_int(false),
            verification_status: VerificationStatus::Pending.as_str().to_string(),
            verification_method: None,
            verification_error: Some(None),
            verified_at: Some(None),
            verified_by: Some(None),
            signer_identity: None,
            signer_fingerprint: None,
            updated_at: timestamp_to_text(&now()),
        };

        self.apply(tenant, id, current.status(), changeset).await
    }

    async fn apply(
        &self,
        tenant: TenantId,
        id: Uuid,
        expected: VerificationStatus,
        changeset: VerificationChangeset,
    ) -> Result<ArtifactSignature, StoreError> {
        let conn = self.dal.conn().await?;

        let tenant_blob = uuid_to_blob(&tenant.0);
        let id_blob = uuid_to_blob(&id);
        let expected_status = expected.as_str().to_string();
        let row: SignatureRow = conn
            .interact(move |conn| {
                conn.transaction::<_, StoreError, _>(|conn| {
                    let updated = diesel::update(
                        artifact_signatures::table
                            .filter(artifact_signatures::tenant_id.eq(&tenant_blob))
                            .filter(artifact_signatures::id.eq(&id_blob))
                            .filter(artifact_signatures::verification_status.eq(&expected_status)),
                    )
                    .set(&changeset)
                    .execute(conn)?;

                    let row = artifact_signatures::table
                        .filter(artifact_signatures::tenant_id.eq(&tenant_blob))
                        .filter(artifact_signatures::id.eq(&id_blob))
                        .select(SignatureRow::as_select())
                        .first(conn)?;

                    if updated == 0 {
                        return Err(StoreError::Conflict(format!(
                            "signature is {}, expected {}",
                            row.verification_status, expected_status
                        )));
                    }
                    Ok(row)
                })
            })
            .await??;

        row.try_into()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
