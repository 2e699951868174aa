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

//! Data access layer for the trust tables.
//!
//! Every method takes the caller's [`TenantId`](crate::models::TenantId) and
//! the tenant predicate is part of every statement, updates included. There
//! is no method that reads or writes across tenants.

pub mod artifact_signatures;
pub mod public_keys;
pub mod repository_policies;
pub(crate) mod rows;
pub mod verification_logs;

use crate::database::Database;
use crate::error::StoreError;
use artifact_signatures::ArtifactSignatureDAL;
use deadpool_diesel::sqlite::Manager as SqliteManager;
use public_keys::PublicKeyDAL;
use repository_policies::RepositoryPolicyDAL;
use verification_logs::VerificationLogDAL;

/// Entry point to the per-table data access objects.
#[derive(Clone, Debug)]
pub struct DAL {
    pub database: Database,
}

impl DAL {
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    pub(crate) async fn conn(
        &self,
    ) -> Result<deadpool::managed::Object<SqliteManager>, StoreError> {
        self.database.get_connection().await
    }

    pub fn artifact_signatures(&self) -> ArtifactSignatureDAL<'_> {
        ArtifactSignatureDAL { dal: self }
    }

    pub fn public_keys(&self) -> PublicKeyDAL<'_> {
        PublicKeyDAL { dal: self }
    }

    pub fn repository_policies(&self) -> RepositoryPolicyDAL<'_> {
        RepositoryPolicyDAL { dal: self }
    }

    pub fn verification_logs(&self) -> VerificationLogDAL<'_> {
        VerificationLogDAL { dal: self }
    }
}
