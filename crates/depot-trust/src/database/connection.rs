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

//! SQLite connection pool management.
//!
//! Connections are pooled with `deadpool-diesel`. Every Diesel call runs on the
//! pool's blocking thread through `interact`.
//!
//! # Example
//!
//! ```rust,ignore
//! use depot_trust::Database;
//!
//! let db = Database::new("sqlite:///var/lib/depot/trust.db", 1)?;
//! db.run_migrations().await?;
//! ```

use crate::error::StoreError;
use deadpool_diesel::sqlite::{Manager as SqliteManager, Pool as SqlitePool, Runtime};
use diesel::prelude::*;
use diesel_migrations::MigrationHarness;
use tracing::{debug, info};

/// A pooled SQLite database.
///
/// Cloning is cheap; clones share the underlying pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("max_size", &self.pool.status().max_size)
            .finish()
    }
}

impl Database {
    /// Creates a pool for the given connection string.
    ///
    /// Accepts `sqlite://path`, a bare file path, or `:memory:`. An in-memory
    /// database is private to each pooled connection, so use a pool size of 1
    /// with it.
    pub fn new(connection_string: &str, max_size: u32) -> Result<Self, StoreError> {
        let connection_url = Self::build_sqlite_url(connection_string);
        let manager = SqliteManager::new(connection_url, Runtime::Tokio1);
        let pool = SqlitePool::builder(manager)
            .max_size(max_size.max(1) as usize)
            .build()
            .map_err(|e| StoreError::Pool(e.to_string()))?;

        info!(max_size = max_size.max(1), "SQLite connection pool initialized");

        Ok(Self { pool })
    }

    fn build_sqlite_url(connection_string: &str) -> String {
        connection_string
            .strip_prefix("sqlite://")
            .unwrap_or(connection_string)
            .to_string()
    }

    /// Applies connection pragmas and runs pending migrations.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.get_connection().await?;

        let applied = conn
            .interact(|conn| -> Result<usize, StoreError> {
                // WAL lets readers proceed during a write.
                diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
                diesel::sql_query("PRAGMA busy_timeout=30000;").execute(conn)?;

                conn.run_pending_migrations(super::MIGRATIONS)
                    .map(|versions| versions.len())
                    .map_err(|e| StoreError::Migration(e.to_string()))
            })
            .await??;

        debug!(applied, "Trust migrations applied");
        Ok(())
    }

    /// Checks a connection out of the pool.
    pub async fn get_connection(
        &self,
    ) -> Result<deadpool::managed::Object<SqliteManager>, StoreError> {
        Ok(self.pool.get().await?)
    }
}
