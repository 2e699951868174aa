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

//! Administrative requests for the trust store and repository policies.
//!
//! Request bodies never carry a tenant id: the service takes it from the
//! authenticated [`ActorContext`](crate::models::ActorContext). Unknown
//! fields are rejected so one cannot be smuggled in.

use crate::crypto::{CryptoError, SpkiPublicKey};
use crate::models::{KeySource, KeyType, NewPublicKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::pgp_verifier::{PgpError, PgpVerifier};

/// Errors turning an administrative request into a stored record.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Invalid OpenPGP key: {0}")]
    Pgp(#[from] PgpError),

    #[error("Invalid public key: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Invalid request: {0}")]
    Invalid(String),
}

/// Adds a key to the trust store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddPublicKeyRequest {
    pub key_type: KeyType,
    /// Armored or binary-as-armored OpenPGP key, or SPKI PEM for cosign
    pub key_material: String,
    /// Display name; derived from the key when absent
    #[serde(default)]
    pub name: Option<String>,
    /// Restricts the key to one repository
    #[serde(default)]
    pub repository_id: Option<Uuid>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_email: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub trusted: bool,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

fn enabled() -> bool {
    true
}

impl AddPublicKeyRequest {
    pub fn new(key_type: KeyType, key_material: impl Into<String>) -> Self {
        Self {
            key_type,
            key_material: key_material.into(),
            name: None,
            repository_id: None,
            organization: None,
            description: None,
            owner_email: None,
            source_url: None,
            trusted: false,
            enabled: true,
            valid_until: None,
        }
    }

    /// Parses the key material and merges the administrator's fields.
    pub fn into_new_key(self) -> Result<NewPublicKey, AdminError> {
        let mut key = match self.key_type {
            KeyType::Pgp => PgpVerifier::extract_key_info(self.key_material.as_bytes())?,
            KeyType::Cosign => cosign_key_info(&self.key_material)?,
        };

        if let Some(name) = self.name.filter(|n| !n.trim().is_empty()) {
            key.name = name;
        }
        if self.owner_email.is_some() {
            key.owner_email = self.owner_email;
        }
        if let (Some(from), Some(until)) = (key.valid_from, self.valid_until) {
            if until < from {
                return Err(AdminError::Invalid(
                    "valid_until precedes the key creation time".to_string(),
                ));
            }
        }

        key.repository_id = self.repository_id;
        key.organization = self.organization;
        key.description = self.description;
        key.source_url = self.source_url;
        key.trusted = self.trusted;
        key.enabled = self.enabled;
        key.valid_until = self.valid_until;
        Ok(key)
    }
}

/// Trust-store record for an SPKI PEM cosign key.
pub fn cosign_key_info(pem: &str) -> Result<NewPublicKey, CryptoError> {
    let key = SpkiPublicKey::from_pem(pem)?;
    let fingerprint = key.fingerprint();
    let short_id = fingerprint[fingerprint.len() - 16..].to_string();

    let mut record = NewPublicKey::new(
        KeyType::Cosign,
        fingerprint,
        short_id.clone(),
        key.algorithm(),
        key.to_pem(),
        format!("Key ID: {}", short_id),
    );
    record.key_size = Some(key.key_size());
    record.key_source = KeySource::Manual;
    Ok(record)
}

/// Changes the trust or enabled flag of a key. Absent fields are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateKeyRequest {
    #[serde(default)]
    pub trusted: Option<bool>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Revokes a key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RevokeKeyRequest {
    #[serde(default)]
    pub reason: Option<String>,
}
