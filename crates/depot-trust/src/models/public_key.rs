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

//! Domain models for trust-store public keys.

use super::{TenantId, UnknownVariant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Scheme a public key verifies.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Pgp,
    Cosign,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Pgp => "pgp",
            KeyType::Cosign => "cosign",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pgp" => Ok(KeyType::Pgp),
            "cosign" => Ok(KeyType::Cosign),
            other => Err(UnknownVariant::new("key type", other)),
        }
    }
}

/// How a key entered the trust store.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    #[default]
    Manual,
    Discovered,
    Imported,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Manual => "manual",
            KeySource::Discovered => "discovered",
            KeySource::Imported => "imported",
        }
    }
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeySource {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(KeySource::Manual),
            "discovered" => Ok(KeySource::Discovered),
            "imported" => Ok(KeySource::Imported),
            other => Err(UnknownVariant::new("key source", other)),
        }
    }
}

/// Canonical fingerprint form: uppercase hex without separators.
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect::<String>()
        .to_ascii_uppercase()
}

/// A trust-store entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub id: Uuid,
    pub tenant_id: TenantId,
    /// None for tenant-wide keys
    pub repository_id: Option<Uuid>,
    pub key_type: KeyType,
    /// Uppercase hex; unique per tenant
    pub fingerprint: String,
    /// Short id (last 16 hex digits of a PGP fingerprint)
    pub key_id: String,
    pub algorithm: String,
    pub key_size: Option<i32>,
    /// Armored PGP key or SPKI PEM
    pub key_material: String,
    pub name: String,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub organization: Option<String>,
    pub description: Option<String>,
    pub key_source: KeySource,
    pub source_url: Option<String>,
    pub trusted: bool,
    pub enabled: bool,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublicKey {
    /// Trust predicate: trusted, enabled, not revoked, and `now` inside the validity window.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.trusted
            && self.enabled
            && !self.revoked
            && self.valid_from.map_or(true, |from| from <= now)
            && self.valid_until.map_or(true, |until| now <= until)
    }

    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }

    /// Whether the key applies to the given repository (tenant-wide keys apply everywhere).
    pub fn applies_to(&self, repository_id: Option<Uuid>) -> bool {
        match self.repository_id {
            None => true,
            Some(scope) => Some(scope) == repository_id,
        }
    }
}

/// A key to be added to (or refreshed in) the trust store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPublicKey {
    pub repository_id: Option<Uuid>,
    pub key_type: KeyType,
    pub fingerprint: String,
    pub key_id: String,
    pub algorithm: String,
    pub key_size: Option<i32>,
    pub key_material: String,
    pub name: String,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
    pub organization: Option<String>,
    pub description: Option<String>,
    pub key_source: KeySource,
    pub source_url: Option<String>,
    pub trusted: bool,
    pub enabled: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl NewPublicKey {
    pub fn new(
        key_type: KeyType,
        fingerprint: impl Into<String>,
        key_id: impl Into<String>,
        algorithm: impl Into<String>,
        key_material: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            repository_id: None,
            key_type,
            fingerprint: fingerprint.into(),
            key_id: key_id.into(),
            algorithm: algorithm.into(),
            key_size: None,
            key_material: key_material.into(),
            name: name.into(),
            owner_name: None,
            owner_email: None,
            organization: None,
            description: None,
            key_source: KeySource::Manual,
            source_url: None,
            trusted: false,
            enabled: true,
            valid_from: None,
            valid_until: None,
        }
    }
}
