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

//! Transparency log client.
//!
//! Only one endpoint is used: `GET {base}/api/v1/log/entries/{uuid}`. The
//! response is a JSON object keyed by entry uuid; it is kept verbatim for the
//! audit trail and decoded into a [`LogEntry`] for proof checks.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Errors raised while fetching or decoding a log entry.
#[derive(Debug, Error)]
pub enum TransparencyLogError {
    #[error("Transparency log request failed: {0}")]
    Network(String),

    #[error("Transparency log request timed out")]
    Timeout,

    #[error("Transparency log returned HTTP {0}")]
    Status(u16),

    #[error("Log entry {0} not found")]
    NotFound(String),

    #[error("Malformed log uuid '{0}'")]
    InvalidUuid(String),

    #[error("Malformed log response: {0}")]
    Decode(String),
}

impl TransparencyLogError {
    /// True when the log could not be consulted at all. Retrying may succeed.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Status(status) => *status >= 500 || *status == 429,
            Self::NotFound(_) | Self::InvalidUuid(_) | Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransparencyLogError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransparencyLogError::Timeout
        } else if e.is_decode() {
            TransparencyLogError::Decode(e.to_string())
        } else {
            TransparencyLogError::Network(e.to_string())
        }
    }
}

/// Inclusion proof as served by the log.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProof {
    pub checkpoint: Option<String>,
    pub hashes: Vec<String>,
    pub log_index: i64,
    pub root_hash: String,
    pub tree_size: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EntryVerification {
    pub inclusion_proof: Option<InclusionProof>,
    pub signed_entry_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    body: String,
    integrated_time: i64,
    #[serde(rename = "logID")]
    log_id: String,
    log_index: i64,
    #[serde(default)]
    verification: EntryVerification,
}

/// One decoded log entry plus the verbatim response.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub uuid: String,
    /// Base64 canonicalized entry body
    pub body: String,
    pub integrated_time: i64,
    /// Hex SHA-256 of the log's public key
    pub log_id: String,
    pub log_index: i64,
    pub verification: EntryVerification,
    pub raw: serde_json::Value,
}

impl LogEntry {
    /// Decodes a `{uuid: entry}` response.
    ///
    /// Logs may key the entry by a longer uuid (tree id prefix plus leaf hash),
    /// so a key ending with the requested uuid also matches.
    pub fn from_response(uuid: &str, raw: serde_json::Value) -> Result<Self, TransparencyLogError> {
        let map = raw
            .as_object()
            .ok_or_else(|| TransparencyLogError::Decode("response is not an object".to_string()))?;
        let (key, value) = map
            .iter()
            .find(|(k, _)| !uuid.is_empty() && k.ends_with(uuid))
            .ok_or_else(|| TransparencyLogError::NotFound(uuid.to_string()))?;
        let entry: RawEntry = serde_json::from_value(value.clone())
            .map_err(|e| TransparencyLogError::Decode(e.to_string()))?;

        Ok(Self {
            uuid: key.clone(),
            body: entry.body,
            integrated_time: entry.integrated_time,
            log_id: entry.log_id,
            log_index: entry.log_index,
            verification: entry.verification,
            raw,
        })
    }
}

/// Source of transparency log entries.
#[async_trait]
pub trait TransparencyLog: Send + Sync {
    async fn get_entry(&self, uuid: &str) -> Result<LogEntry, TransparencyLogError>;
}

/// Serves preloaded log responses without network access.
///
/// Used for offline verification against entries captured ahead of time.
/// Lookups of unknown uuids fail with [`TransparencyLogError::NotFound`], or
/// with [`TransparencyLogError::Network`] when marked unavailable.
#[derive(Debug, Clone, Default)]
pub struct StaticLog {
    responses: Vec<(String, serde_json::Value)>,
    unavailable: bool,
}

impl StaticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `{uuid: entry}` response as the log would return it.
    pub fn with_response(mut self, uuid: impl Into<String>, response: serde_json::Value) -> Self {
        self.responses.push((uuid.into(), response));
        self
    }

    /// A log that fails every request as if unreachable.
    pub fn unavailable() -> Self {
        Self {
            responses: Vec::new(),
            unavailable: true,
        }
    }
}

#[async_trait]
impl TransparencyLog for StaticLog {
    async fn get_entry(&self, uuid: &str) -> Result<LogEntry, TransparencyLogError> {
        if self.unavailable {
            return Err(TransparencyLogError::Network("log offline".to_string()));
        }
        let (_, response) = self
            .responses
            .iter()
            .find(|(known, _)| known == uuid)
            .ok_or_else(|| TransparencyLogError::NotFound(uuid.to_string()))?;
        LogEntry::from_response(uuid, response.clone())
    }
}

/// HTTP client for a Rekor-compatible log.
#[derive(Debug, Clone)]
pub struct RekorClient {
    base_url: Url,
    http: reqwest::Client,
}

impl RekorClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, TransparencyLogError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("depot-trust/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn entry_url(&self, uuid: &str) -> Result<String, TransparencyLogError> {
        let well_formed = (64..=80).contains(&uuid.len())
            && uuid.chars().all(|c| c.is_ascii_hexdigit());
        if !well_formed {
            return Err(TransparencyLogError::InvalidUuid(uuid.to_string()));
        }
        Ok(format!(
            "{}/api/v1/log/entries/{}",
            self.base_url.as_str().trim_end_matches('/'),
            uuid
        ))
    }
}

#[async_trait]
impl TransparencyLog for RekorClient {
    async fn get_entry(&self, uuid: &str) -> Result<LogEntry, TransparencyLogError> {
        let url = self.entry_url(uuid)?;
        debug!(url = %url, "Fetching transparency log entry");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransparencyLogError::NotFound(uuid.to_string()));
        }
        if !status.is_success() {
            return Err(TransparencyLogError::Status(status.as_u16()));
        }

        let raw: serde_json::Value = response.json().await?;
        LogEntry::from_response(uuid, raw)
    }
}
