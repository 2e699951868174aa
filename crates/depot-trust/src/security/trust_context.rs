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

//! Per-verification snapshot of the trust store.

use crate::crypto::SpkiPublicKey;
use crate::dal::DAL;
use crate::error::StoreError;
use crate::models::{normalize_fingerprint, KeyType, PublicKey, TenantId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::pgp_verifier::PgpVerifier;

/// The keys a single verification may rely on.
///
/// Built fresh for every verification so that revoking, disabling or
/// distrusting a key takes effect on the next call. Only keys that satisfy
/// the trust predicate at `evaluated_at` and apply to the repository are kept.
#[derive(Debug, Clone)]
pub struct TrustContext {
    tenant_id: TenantId,
    repository_id: Option<Uuid>,
    keys: Vec<PublicKey>,
    evaluated_at: DateTime<Utc>,
}

impl TrustContext {
    pub fn new(
        tenant_id: TenantId,
        repository_id: Option<Uuid>,
        keys: impl IntoIterator<Item = PublicKey>,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        let keys = keys
            .into_iter()
            .filter(|k| {
                k.tenant_id == tenant_id
                    && k.is_usable_at(evaluated_at)
                    && k.applies_to(repository_id)
            })
            .collect();
        Self {
            tenant_id,
            repository_id,
            keys,
            evaluated_at,
        }
    }

    /// A context that trusts nothing.
    pub fn empty(tenant_id: TenantId, repository_id: Option<Uuid>) -> Self {
        Self::new(tenant_id, repository_id, Vec::new(), Utc::now())
    }

    /// Loads the usable keys for a repository from the store.
    pub async fn load(
        dal: &DAL,
        tenant_id: TenantId,
        repository_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let keys = dal
            .public_keys()
            .usable(tenant_id, repository_id, None, now)
            .await?;
        Ok(Self::new(tenant_id, repository_id, keys, now))
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn repository_id(&self) -> Option<Uuid> {
        self.repository_id
    }

    pub fn evaluated_at(&self) -> DateTime<Utc> {
        self.evaluated_at
    }

    pub fn keys(&self) -> &[PublicKey] {
        &self.keys
    }

    pub fn keys_of_type(&self, key_type: KeyType) -> impl Iterator<Item = &PublicKey> {
        self.keys.iter().filter(move |k| k.key_type == key_type)
    }

    /// The trusted cosign key whose SPKI fingerprint matches `key`.
    pub fn cosign_key(&self, key: &SpkiPublicKey) -> Option<&PublicKey> {
        let fingerprint = key.fingerprint();
        self.keys_of_type(KeyType::Cosign)
            .find(|k| normalize_fingerprint(&k.fingerprint) == fingerprint)
    }

    /// A PGP verifier whose keyring holds exactly the trusted PGP keys.
    pub fn pgp_verifier(&self) -> PgpVerifier {
        let verifier = PgpVerifier::new();
        verifier.add_trusted_keys(&self.keys, self.evaluated_at);
        verifier
    }
}
