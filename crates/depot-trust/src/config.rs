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

//! Configuration for the trust subsystem.
//!
//! Use [`TrustConfig::builder()`] to construct a configuration in code, or
//! [`TrustConfig::from_env()`] to read it from the process environment (a `.env`
//! file is honoured when present).
//!
//! ```rust
//! use depot_trust::TrustConfig;
//! use std::time::Duration;
//!
//! let config = TrustConfig::builder()
//!     .database_url("sqlite:///var/lib/depot/trust.db")
//!     .request_timeout(Duration::from_secs(10))
//!     .build()
//!     .unwrap();
//! assert_eq!(config.request_timeout(), Duration::from_secs(10));
//! ```

use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default transparency log server.
pub const DEFAULT_TRANSPARENCY_LOG_URL: &str = "https://rekor.sigstore.dev";

/// Default bound on transparency log requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while building or loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        /// Setting or environment variable name
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    #[error("Failed to read {path}: {error}")]
    ReadFile {
        /// File that could not be read
        path: String,
        /// Underlying IO error
        error: String,
    },
}

/// Configuration for the trust subsystem.
#[derive(Debug, Clone)]
pub struct TrustConfig {
    database_url: String,
    db_pool_size: u32,
    transparency_log_url: Url,
    request_timeout: Duration,
    ca_roots_pem: Option<String>,
    transparency_log_public_key_pem: Option<String>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://depot-trust.db".to_string(),
            db_pool_size: 1,
            transparency_log_url: default_log_url(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ca_roots_pem: None,
            transparency_log_public_key_pem: None,
        }
    }
}

fn default_log_url() -> Url {
    // Constant URL; parsing cannot fail.
    Url::parse(DEFAULT_TRANSPARENCY_LOG_URL).unwrap_or_else(|_| unreachable!())
}

impl TrustConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> TrustConfigBuilder {
        TrustConfigBuilder::default()
    }

    /// Loads configuration from the environment.
    ///
    /// Recognised variables:
    /// - `DEPOT_TRUST_DATABASE_URL`
    /// - `DEPOT_TRUST_DB_POOL_SIZE`
    /// - `DEPOT_TRUST_TLOG_URL`
    /// - `DEPOT_TRUST_TLOG_TIMEOUT_SECS`
    /// - `DEPOT_TRUST_CA_ROOTS_FILE` (PEM bundle)
    /// - `DEPOT_TRUST_TLOG_PUBLIC_KEY_FILE` (SPKI PEM)
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut builder = TrustConfig::builder();

        if let Ok(url) = std::env::var("DEPOT_TRUST_DATABASE_URL") {
            builder = builder.database_url(url);
        }
        if let Ok(size) = std::env::var("DEPOT_TRUST_DB_POOL_SIZE") {
            let size = size.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                name: "DEPOT_TRUST_DB_POOL_SIZE",
                reason: e.to_string(),
            })?;
            builder = builder.db_pool_size(size);
        }
        if let Ok(url) = std::env::var("DEPOT_TRUST_TLOG_URL") {
            builder = builder.transparency_log_url(url);
        }
        if let Ok(secs) = std::env::var("DEPOT_TRUST_TLOG_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                name: "DEPOT_TRUST_TLOG_TIMEOUT_SECS",
                reason: e.to_string(),
            })?;
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Ok(path) = std::env::var("DEPOT_TRUST_CA_ROOTS_FILE") {
            builder = builder.ca_roots_pem(read_file(&path)?);
        }
        if let Ok(path) = std::env::var("DEPOT_TRUST_TLOG_PUBLIC_KEY_FILE") {
            builder = builder.transparency_log_public_key_pem(read_file(&path)?);
        }

        builder.build()
    }

    /// Database connection string (`sqlite://` prefix optional).
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Maximum number of pooled connections.
    pub fn db_pool_size(&self) -> u32 {
        self.db_pool_size
    }

    /// Base URL of the transparency log server.
    pub fn transparency_log_url(&self) -> &Url {
        &self.transparency_log_url
    }

    /// Bound on each transparency log request.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// PEM bundle of certificate authorities trusted to issue keyless signing certificates.
    pub fn ca_roots_pem(&self) -> Option<&str> {
        self.ca_roots_pem.as_deref()
    }

    /// SPKI PEM of the transparency log signing key.
    pub fn transparency_log_public_key_pem(&self) -> Option<&str> {
        self.transparency_log_public_key_pem.as_deref()
    }
}

fn read_file(path: &str) -> Result<String, ConfigError> {
    std::fs::read_to_string(Path::new(path)).map_err(|e| ConfigError::ReadFile {
        path: path.to_string(),
        error: e.to_string(),
    })
}

/// Builder for [`TrustConfig`].
#[derive(Debug, Default)]
pub struct TrustConfigBuilder {
    config: TrustConfig,
    transparency_log_url: Option<String>,
}

impl TrustConfigBuilder {
    /// Sets the database connection string.
    pub fn database_url(mut self, value: impl Into<String>) -> Self {
        self.config.database_url = value.into();
        self
    }

    /// Sets the connection pool size.
    pub fn db_pool_size(mut self, value: u32) -> Self {
        self.config.db_pool_size = value;
        self
    }

    /// Sets the transparency log base URL. Validated in [`build`](Self::build).
    pub fn transparency_log_url(mut self, value: impl Into<String>) -> Self {
        self.transparency_log_url = Some(value.into());
        self
    }

    /// Sets the transparency log request timeout.
    pub fn request_timeout(mut self, value: Duration) -> Self {
        self.config.request_timeout = value;
        self
    }

    /// Sets the trusted CA bundle for keyless certificates.
    pub fn ca_roots_pem(mut self, value: impl Into<String>) -> Self {
        self.config.ca_roots_pem = Some(value.into());
        self
    }

    /// Sets the transparency log public key.
    pub fn transparency_log_public_key_pem(mut self, value: impl Into<String>) -> Self {
        self.config.transparency_log_public_key_pem = Some(value.into());
        self
    }

    /// Validates and builds the configuration.
    pub fn build(mut self) -> Result<TrustConfig, ConfigError> {
        if self.config.db_pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "db_pool_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.config.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "request_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if let Some(raw) = self.transparency_log_url.take() {
            let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
                name: "transparency_log_url",
                reason: e.to_string(),
            })?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidValue {
                    name: "transparency_log_url",
                    reason: format!("unsupported scheme '{}'", url.scheme()),
                });
            }
            self.config.transparency_log_url = url;
        }
        Ok(self.config)
    }
}
