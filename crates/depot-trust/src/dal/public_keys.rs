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

//! Trust-store key records.
//!
//! Keys are unique per `(tenant, fingerprint)`. Adding a key that already
//! exists refreshes its metadata and trust flags in place; the stored id,
//! creation time and revocation state are kept. Keys are never deleted.

use super::rows::{NewPublicKeyRow, PublicKeyRefresh, PublicKeyRow};
use super::DAL;
use crate::database::codec::{bool_to_int, now, timestamp_to_text, uuid_to_blob};
use crate::database::schema::public_keys;
use crate::error::StoreError;
use crate::models::{normalize_fingerprint, KeyType, NewPublicKey, PublicKey, TenantId};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

/// Whether [`PublicKeyDAL::upsert`] inserted or refreshed a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

pub struct PublicKeyDAL<'a> {
    pub dal: &'a DAL,
}

impl<'a> PublicKeyDAL<'a> {
    /// Inserts a key or refreshes the existing key with the same fingerprint.
    pub async fn upsert(
        &self,
        tenant: TenantId,
        new_key: NewPublicKey,
    ) -> Result<(PublicKey, UpsertOutcome), StoreError> {
        let conn = self.dal.conn().await?;

        let now = timestamp_to_text(&now());
        let fingerprint = normalize_fingerprint(&new_key.fingerprint);
        let tenant_blob = uuid_to_blob(&tenant.0);

        let refresh = PublicKeyRefresh {
            repository_id: new_key.repository_id.as_ref().map(uuid_to_blob),
            key_id: new_key.key_id.to_ascii_uppercase(),
            algorithm: new_key.algorithm.clone(),
            key_size: new_key.key_size,
            key_material: new_key.key_material.clone(),
            name: new_key.name.clone(),
            owner_name: new_key.owner_name.clone(),
            owner_email: new_key.owner_email.clone(),
            organization: new_key.organization.clone(),
            description: new_key.description.clone(),
            key_source: new_key.key_source.as_str().to_string(),
            source_url: new_key.source_url.clone(),
            trusted: bool_to_int(new_key.trusted),
            enabled: bool_to_int(new_key.enabled),
            valid_from: new_key.valid_from.as_ref().map(timestamp_to_text),
            valid_until: new_key.valid_until.as_ref().map(timestamp_to_text),
            updated_at: now.clone(),
        };

        let insert = NewPublicKeyRow {
            id: uuid_to_blob(&Uuid::new_v4()),
            tenant_id: tenant_blob.clone(),
            repository_id: refresh.repository_id.clone(),
            key_type: new_key.key_type.as_str().to_string(),
            fingerprint: fingerprint.clone(),
            key_id: refresh.key_id.clone(),
            algorithm: new_key.algorithm,
            key_size: new_key.key_size,
            key_material: new_key.key_material,
            name: new_key.name,
            owner_name: new_key.owner_name,
            owner_email: new_key.owner_email,
            organization: new_key.organization,
            description: new_key.description,
            key_source: refresh.key_source.clone(),
            source_url: new_key.source_url,
            trusted: refresh.trusted,
            enabled: refresh.enabled,
            revoked: bool_to_int(false),
            valid_from: refresh.valid_from.clone(),
            valid_until: refresh.valid_until.clone(),
            created_at: now.clone(),
            updated_at: now,
        };

        let (row, outcome) = conn
            .interact(move |conn| {
                conn.transaction::<_, StoreError, _>(|conn| {
                    let scope = || {
                        public_keys::table
                            .filter(public_keys::tenant_id.eq(&tenant_blob))
                            .filter(public_keys::fingerprint.eq(&fingerprint))
                    };

                    let existing: Option<Vec<u8>> = scope()
                        .select(public_keys::id)
                        .first(conn)
                        .optional()?;

                    let outcome = match existing {
                        Some(id) => {
                            diesel::update(public_keys::table.filter(public_keys::id.eq(&id)))
                                .set(&refresh)
                                .execute(conn)?;
                            UpsertOutcome::Updated
                        }
                        None => {
                            diesel::insert_into(public_keys::table)
                                .values(&insert)
                                .execute(conn)?;
                            UpsertOutcome::Inserted
                        }
                    };

                    let row: PublicKeyRow =
                        scope().select(PublicKeyRow::as_select()).first(conn)?;
                    Ok((row, outcome))
                })
            })
            .await??;

        Ok((row.try_into()?, outcome))
    }

    pub async fn get(&self, tenant: TenantId, id: Uuid) -> Result<PublicKey, StoreError> {
        let conn = self.dal.conn().await?;

        let tenant_blob = uuid_to_blob(&tenant.0);
        let id_blob = uuid_to_blob(&id);
        let row: PublicKeyRow = conn
            .interact(move |conn| {
                public_keys::table
                    .filter(public_keys::tenant_id.eq(&tenant_blob))
                    .filter(public_keys::id.eq(&id_blob))
                    .select(PublicKeyRow::as_select())
                    .first(conn)
            })
            .await??;

        row.try_into()
    }

    pub async fn find_by_fingerprint(
        &self,
        tenant: TenantId,
        fingerprint: &str,
    ) -> Result<Option<PublicKey>, StoreError> {
        let conn = self.dal.conn().await?;

        let tenant_blob = uuid_to_blob(&tenant.0);
        let fingerprint = normalize_fingerprint(fingerprint);
        let row: Option<PublicKeyRow> = conn
            .interact(move |conn| {
                public_keys::table
                    .filter(public_keys::tenant_id.eq(&tenant_blob))
                    .filter(public_keys::fingerprint.eq(&fingerprint))
                    .select(PublicKeyRow::as_select())
                    .first(conn)
                    .optional()
            })
            .await??;

        row.map(TryInto::try_into).transpose()
    }

    /// Every key of the tenant in any state, newest first.
    pub async fn list(&self, tenant: TenantId) -> Result<Vec<PublicKey>, StoreError> {
        let conn = self.dal.conn().await?;

        let tenant_blob = uuid_to_blob(&tenant.0);
        let rows: Vec<PublicKeyRow> = conn
            .interact(move |conn| {
                public_keys::table
                    .filter(public_keys::tenant_id.eq(&tenant_blob))
                    .order(public_keys::created_at.desc())
                    .select(PublicKeyRow::as_select())
                    .load(conn)
            })
            .await??;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Keys usable at `now` for the repository, newest first.
    ///
    /// Tenant-wide keys are always included; repository-scoped keys only for
    /// their own repository. The trust predicate is evaluated on every call.
    pub async fn usable(
        &self,
        tenant: TenantId,
        repository_id: Option<Uuid>,
        key_type: Option<KeyType>,
        now: DateTime<Utc>,
    ) -> Result<Vec<PublicKey>, StoreError> {
        let conn = self.dal.conn().await?;

        let tenant_blob = uuid_to_blob(&tenant.0);
        let repository_blob = repository_id.as_ref().map(uuid_to_blob);
        let key_type = key_type.map(|t| t.as_str().to_string());
        let rows: Vec<PublicKeyRow> = conn
            .interact(move |conn| {
                let mut query = public_keys::table
                    .select(PublicKeyRow::as_select())
                    .filter(public_keys::tenant_id.eq(tenant_blob))
                    .filter(public_keys::trusted.eq(1))
                    .filter(public_keys::enabled.eq(1))
                    .filter(public_keys::revoked.eq(0))
                    .into_boxed();

                query = match repository_blob {
                    Some(repo) => query.filter(
                        public_keys::repository_id
                            .is_null()
                            .or(public_keys::repository_id.eq(repo)),
                    ),
                    None => query.filter(public_keys::repository_id.is_null()),
                };
                if let Some(key_type) = key_type {
                    query = query.filter(public_keys::key_type.eq(key_type));
                }

                query.order(public_keys::created_at.desc()).load(conn)
            })
            .await??;

        let keys = rows
            .into_iter()
            .map(TryInto::<PublicKey>::try_into)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(keys.into_iter().filter(|k| k.is_usable_at(now)).collect())
    }

    /// Marks a key revoked. Revocation is permanent.
    pub async fn revoke(
        &self,
        tenant: TenantId,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<PublicKey, StoreError> {
        self.change(tenant, id, KeyChange::Revoke(reason)).await
    }

    pub async fn set_enabled(
        &self,
        tenant: TenantId,
        id: Uuid,
        enabled: bool,
    ) -> Result<PublicKey, StoreError> {
        self.change(tenant, id, KeyChange::Enabled(enabled)).await
    }

    pub async fn set_trusted(
        &self,
        tenant: TenantId,
        id: Uuid,
        trusted: bool,
    ) -> Result<PublicKey, StoreError> {
        self.change(tenant, id, KeyChange::Trusted(trusted)).await
    }

    async fn change(
        &self,
        tenant: TenantId,
        id: Uuid,
        change: KeyChange,
    ) -> Result<PublicKey, StoreError> {
        let conn = self.dal.conn().await?;

        let now = timestamp_to_text(&now());
        let tenant_blob = uuid_to_blob(&tenant.0);
        let id_blob = uuid_to_blob(&id);
        let row: PublicKeyRow = conn
            .interact(move |conn| -> Result<PublicKeyRow, StoreError> {
                let target = || {
                    public_keys::table
                        .filter(public_keys::tenant_id.eq(&tenant_blob))
                        .filter(public_keys::id.eq(&id_blob))
                };

                let updated = match change {
                    KeyChange::Revoke(reason) => diesel::update(target())
                        .set((
                            public_keys::revoked.eq(1),
                            public_keys::revoked_at.eq(Some(now.clone())),
                            public_keys::revocation_reason.eq(reason),
                            public_keys::updated_at.eq(&now),
                        ))
                        .execute(conn)?,
                    KeyChange::Enabled(enabled) => diesel::update(target())
                        .set((
                            public_keys::enabled.eq(bool_to_int(enabled)),
                            public_keys::updated_at.eq(&now),
                        ))
                        .execute(conn)?,
                    KeyChange::Trusted(trusted) => diesel::update(target())
                        .set((
                            public_keys::trusted.eq(bool_to_int(trusted)),
                            public_keys::updated_at.eq(&now),
                        ))
                        .execute(conn)?,
                };
                if updated == 0 {
                    return Err(StoreError::NotFound);
                }

                Ok(target().select(PublicKeyRow::as_select()).first(conn)?)
            })
            .await??;

        row.try_into()
    }
}

enum KeyChange {
    Revoke(Option<String>),
    Enabled(bool),
    Trusted(bool),
}
