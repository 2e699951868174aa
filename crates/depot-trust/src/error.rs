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

//! Storage error type shared by the database and DAL layers.

use thiserror::Error;

/// Errors raised by persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Record already exists: {0}")]
    Conflict(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Corrupt {table} row: {reason}")]
    Corrupt {
        /// Table the row was read from
        table: &'static str,
        /// What could not be decoded
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn corrupt(table: &'static str, reason: impl ToString) -> Self {
        StoreError::Corrupt {
            table,
            reason: reason.to_string(),
        }
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match e {
            Error::NotFound => StoreError::NotFound,
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict(info.message().to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<deadpool::managed::PoolError<deadpool_diesel::Error>> for StoreError {
    fn from(e: deadpool::managed::PoolError<deadpool_diesel::Error>) -> Self {
        StoreError::Pool(e.to_string())
    }
}

impl From<deadpool_diesel::InteractError> for StoreError {
    fn from(e: deadpool_diesel::InteractError) -> Self {
        StoreError::Pool(e.to_string())
    }
}
