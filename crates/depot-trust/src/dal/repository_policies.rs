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

//! Repository signature policies, one row per `(tenant, repository)`.

use super::rows::{NewPolicyRow, PolicyChangeset, PolicyRow};
use super::DAL;
use crate::database::codec::{bool_to_int, now, timestamp_to_text, uuid_to_blob};
use crate::database::schema::repository_signature_policies as policies;
use crate::error::StoreError;
use crate::models::{PolicySettings, RepositorySignaturePolicy, TenantId};
use diesel::prelude::*;
use uuid::Uuid;

pub struct RepositoryPolicyDAL<'a> {
    pub dal: &'a DAL,
}

impl<'a> RepositoryPolicyDAL<'a> {
    /// The stored policy, if the repository has been configured.
    pub async fn get(
        &self,
        tenant: TenantId,
        repository_id: Uuid,
    ) -> Result<Option<RepositorySignaturePolicy>, StoreError> {
        let conn = self.dal.conn().await?;

        let tenant_blob = uuid_to_blob(&tenant.0);
        let repository_blob = uuid_to_blob(&repository_id);
        let row: Option<PolicyRow> = conn
            .interact(move |conn| {
                policies::table
                    .filter(policies::tenant_id.eq(&tenant_blob))
                    .filter(policies::repository_id.eq(&repository_blob))
                    .select(PolicyRow::as_select())
                    .first(conn)
                    .optional()
            })
            .await??;

        row.map(TryInto::try_into).transpose()
    }

    /// Creates or replaces the policy. The original creation time is kept.
    pub async fn upsert(
        &self,
        tenant: TenantId,
        repository_id: Uuid,
        settings: PolicySettings,
    ) -> Result<RepositorySignaturePolicy, StoreError> {
        let conn = self.dal.conn().await?;

        let now = timestamp_to_text(&now());
        let allowed_signers = serde_json::to_string(&settings.allowed_signers)
            .map_err(|e| StoreError::Database(format!("unencodable allow-list: {}", e)))?;

        let changes = PolicyChangeset {
            signature_policy: settings.signature_policy.as_str().to_string(),
            verification_enabled: bool_to_int(settings.signature_verification_enabled),
            cosign_enabled: bool_to_int(settings.cosign_enabled),
            pgp_enabled: bool_to_int(settings.pgp_enabled),
            sigstore_enabled: bool_to_int(settings.sigstore_enabled),
            allowed_signers,
            updated_at: now.clone(),
        };
        let row = NewPolicyRow {
            tenant_id: uuid_to_blob(&tenant.0),
            repository_id: uuid_to_blob(&repository_id),
            signature_policy: changes.signature_policy.clone(),
            verification_enabled: changes.verification_enabled,
            cosign_enabled: changes.cosign_enabled,
            pgp_enabled: changes.pgp_enabled,
            sigstore_enabled: changes.sigstore_enabled,
            allowed_signers: changes.allowed_signers.clone(),
            created_at: now.clone(),
            updated_at: now,
        };

        let tenant_blob = row.tenant_id.clone();
        let repository_blob = row.repository_id.clone();
        let stored: PolicyRow = conn
            .interact(move |conn| -> Result<PolicyRow, StoreError> {
                diesel::insert_into(policies::table)
                    .values(&row)
                    .on_conflict((policies::tenant_id, policies::repository_id))
                    .do_update()
                    .set(&changes)
                    .execute(conn)?;

                Ok(policies::table
                    .filter(policies::tenant_id.eq(&tenant_blob))
                    .filter(policies::repository_id.eq(&repository_blob))
                    .select(PolicyRow::as_select())
                    .first(conn)?)
            })
            .await??;

        stored.try_into()
    }
}
