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

//! Append-only verification audit log.

use super::rows::VerificationLogRow;
use super::DAL;
use crate::database::codec::{now, timestamp_to_text, uuid_to_blob};
use crate::database::schema::verification_logs;
use crate::error::StoreError;
use crate::models::{NewVerificationLog, TenantId, VerificationLog};
use diesel::prelude::*;
use uuid::Uuid;

pub struct VerificationLogDAL<'a> {
    pub dal: &'a DAL,
}

impl<'a> VerificationLogDAL<'a> {
    /// Appends one entry.
    pub async fn append(
        &self,
        tenant: TenantId,
        entry: NewVerificationLog,
    ) -> Result<VerificationLog, StoreError> {
        let conn = self.dal.conn().await?;

        let row = VerificationLogRow {
            id: uuid_to_blob(&Uuid::new_v4()),
            tenant_id: uuid_to_blob(&tenant.0),
            artifact_id: uuid_to_blob(&entry.artifact_id),
            signature_id: entry.signature_id.as_ref().map(uuid_to_blob),
            verification_type: entry.verification_type,
            verification_result: entry.verification_result.as_str().to_string(),
            verification_status: entry.verification_status.as_str().to_string(),
            verification_method: entry.verification_method,
            error_code: entry.error_code,
            error_message: entry.error_message,
            actor_id: entry.actor_id.as_ref().map(uuid_to_blob),
            client_ip: entry.client_ip,
            user_agent: entry.user_agent,
            created_at: timestamp_to_text(&now()),
        };

        let id_blob = row.id.clone();
        let stored: VerificationLogRow = conn
            .interact(move |conn| -> Result<VerificationLogRow, StoreError> {
                diesel::insert_into(verification_logs::table)
                    .values(&row)
                    .execute(conn)?;
                Ok(verification_logs::table
                    .filter(verification_logs::id.eq(&id_blob))
                    .select(VerificationLogRow::as_select())
                    .first(conn)?)
            })
            .await??;

        stored.try_into()
    }

    /// Entries for one signature, newest first.
    pub async fn list_for_signature(
        &self,
        tenant: TenantId,
        signature_id: Uuid,
    ) -> Result<Vec<VerificationLog>, StoreError> {
        let conn = self.dal.conn().await?;

        let tenant_blob = uuid_to_blob(&tenant.0);
        let signature_blob = uuid_to_blob(&signature_id);
        let rows: Vec<VerificationLogRow> = conn
            .interact(move |conn| {
                verification_logs::table
                    .filter(verification_logs::tenant_id.eq(&tenant_blob))
                    .filter(verification_logs::signature_id.eq(&signature_blob))
                    .order(verification_logs::created_at.desc())
                    .select(VerificationLogRow::as_select())
                    .load(conn)
            })
            .await??;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Entries for one artifact across all its signatures, newest first.
    pub async fn list_for_artifact(
        &self,
        tenant: TenantId,
        artifact_id: Uuid,
    ) -> Result<Vec<VerificationLog>, StoreError> {
        let conn = self.dal.conn().await?;

        let tenant_blob = uuid_to_blob(&tenant.0);
        let artifact_blob = uuid_to_blob(&artifact_id);
        let rows: Vec<VerificationLogRow> = conn
            .interact(move |conn| {
                verification_logs::table
                    .filter(verification_logs::tenant_id.eq(&tenant_blob))
                    .filter(verification_logs::artifact_id.eq(&artifact_blob))
                    .order(verification_logs::created_at.desc())
                    .select(VerificationLogRow::as_select())
                    .load(conn)
            })
            .await??;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
