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

//! # depot-trust
//!
//! The artifact trust subsystem of the depot artifact repository manager.
//!
//! This crate provides:
//! - [`crypto::integrity`]: single-pass SHA-256 + SHA-512 content hashing and
//!   `algorithm:hex` digest handling
//! - [`security::CosignVerifier`]: keyless (certificate + transparency log) and
//!   key-based container/blob signature verification
//! - [`security::PgpVerifier`]: detached OpenPGP signature verification against a keyring
//! - [`security::SignatureService`]: persistence, verification orchestration,
//!   the trusted-key store, repository policies and the verification audit trail
//! - [`security::enforcement`]: pure upload/download gate decisions
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use depot_trust::{Database, DAL, TrustConfig};
//! use depot_trust::security::SignatureService;
//!
//! let config = TrustConfig::from_env()?;
//! let database = Database::new(config.database_url(), config.db_pool_size())?;
//! database.run_migrations().await?;
//! let service = SignatureService::from_config(&config, DAL::new(database))?;
//! ```

pub mod config;
pub mod crypto;
pub mod dal;
pub mod database;
pub mod error;
pub mod models;
pub mod security;

pub use config::{ConfigError, TrustConfig, TrustConfigBuilder};
pub use dal::DAL;
pub use database::Database;
pub use error::StoreError;
pub use models::{
    ActorContext, ArtifactSignature, KeySource, KeyType, NewArtifactSignature, NewPublicKey,
    PolicySettings, PublicKey, RepositorySignaturePolicy, SignatureFormat, SignaturePayload,
    SignaturePolicy, SignatureType, TenantId, VerificationLog, VerificationResult,
    VerificationStatus,
};

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence when set; otherwise the given level (default `info`)
/// applies. Calling this more than once is harmless.
///
/// # Examples
///
/// ```rust
/// use tracing::Level;
///
/// depot_trust::init_logging(Some(Level::DEBUG));
/// depot_trust::init_logging(None);
/// ```
pub fn init_logging(level: Option<Level>) {
    let level = level.unwrap_or(Level::INFO);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
