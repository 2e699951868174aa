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

//! Domain models for artifact signatures.
//!
//! An [`ArtifactSignature`] is a common envelope (identity, raw bytes,
//! verification state) plus exactly one scheme payload. The signature type is
//! derived from the payload variant, so a record can never claim one scheme
//! while carrying another scheme's fields.

use super::verification::VerificationStatus;
use super::{TenantId, UnknownVariant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Signing scheme of a signature.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureType {
    Cosign,
    Pgp,
    Sigstore,
}

impl SignatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureType::Cosign => "cosign",
            SignatureType::Pgp => "pgp",
            SignatureType::Sigstore => "sigstore",
        }
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosign" => Ok(SignatureType::Cosign),
            "pgp" => Ok(SignatureType::Pgp),
            "sigstore" => Ok(SignatureType::Sigstore),
            other => Err(UnknownVariant::new("signature type", other)),
        }
    }
}

/// Encoding of the stored signature bytes.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum SignatureFormat {
    #[serde(rename = "binary")]
    Binary,
    #[serde(rename = "ascii-armor")]
    AsciiArmor,
}

impl SignatureFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureFormat::Binary => "binary",
            SignatureFormat::AsciiArmor => "ascii-armor",
        }
    }
}

impl fmt::Display for SignatureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureFormat {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(SignatureFormat::Binary),
            "ascii-armor" => Ok(SignatureFormat::AsciiArmor),
            other => Err(UnknownVariant::new("signature format", other)),
        }
    }
}

/// Cosign-specific fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosignPayload {
    /// Opaque bundle as uploaded by the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    /// PEM-encoded signing certificate (keyless mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    /// Signed digest in `algorithm:hex` form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rekor_log_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rekor_log_uuid: Option<String>,
}

/// PGP-specific fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgpPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
}

/// Sigstore attestation fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigstorePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<String>,
}

/// Scheme payload. The variant determines the signature type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignaturePayload {
    Cosign(CosignPayload),
    Pgp(PgpPayload),
    Sigstore(SigstorePayload),
}

impl SignaturePayload {
    pub fn signature_type(&self) -> SignatureType {
        match self {
            SignaturePayload::Cosign(_) => SignatureType::Cosign,
            SignaturePayload::Pgp(_) => SignatureType::Pgp,
            SignaturePayload::Sigstore(_) => SignatureType::Sigstore,
        }
    }

    /// Encodes the variant fields as the JSON stored next to the type column.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            SignaturePayload::Cosign(p) => serde_json::to_string(p),
            SignaturePayload::Pgp(p) => serde_json::to_string(p),
            SignaturePayload::Sigstore(p) => serde_json::to_string(p),
        }
    }

    /// Decodes stored JSON for the given signature type.
    pub fn from_json(signature_type: SignatureType, json: &str) -> Result<Self, serde_json::Error> {
        Ok(match signature_type {
            SignatureType::Cosign => SignaturePayload::Cosign(serde_json::from_str(json)?),
            SignatureType::Pgp => SignaturePayload::Pgp(serde_json::from_str(json)?),
            SignatureType::Sigstore => SignaturePayload::Sigstore(serde_json::from_str(json)?),
        })
    }

    pub fn as_cosign(&self) -> Option<&CosignPayload> {
        match self {
            SignaturePayload::Cosign(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_pgp(&self) -> Option<&PgpPayload> {
        match self {
            SignaturePayload::Pgp(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_sigstore(&self) -> Option<&SigstorePayload> {
        match self {
            SignaturePayload::Sigstore(p) => Some(p),
            _ => None,
        }
    }
}

/// Mutable verification fields of a signature record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationState {
    pub verified: bool,
    pub status: VerificationStatus,
    pub method: Option<String>,
    pub error: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<Uuid>,
}

impl Default for VerificationState {
    fn default() -> Self {
        Self {
            verified: false,
            status: VerificationStatus::Pending,
            method: None,
            error: None,
            verified_at: None,
            verified_by: None,
        }
    }
}

/// A signature attached to an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSignature {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub artifact_id: Uuid,
    pub repository_id: Uuid,
    pub signature_format: SignatureFormat,
    /// Raw signature bytes as uploaded; never rewritten
    pub signature_data: Vec<u8>,
    pub signature_algorithm: String,
    pub signer_identity: Option<String>,
    pub signer_fingerprint: Option<String>,
    /// Embedded or referenced public key material
    pub public_key: Option<String>,
    pub payload: SignaturePayload,
    pub verification: VerificationState,
    /// Claimed by the signer; not trusted
    pub signed_at: Option<DateTime<Utc>>,
    /// Assigned by the server
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArtifactSignature {
    pub fn signature_type(&self) -> SignatureType {
        self.payload.signature_type()
    }

    pub fn status(&self) -> VerificationStatus {
        self.verification.status
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }
}

/// A signature to be stored.
///
/// Carries no signer identity or fingerprint; only verification writes those.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArtifactSignature {
    /// Caller-chosen id; generated when absent. Storing an id that already
    /// exists fails rather than overwriting.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub artifact_id: Uuid,
    pub repository_id: Uuid,
    pub signature_format: SignatureFormat,
    pub signature_data: Vec<u8>,
    pub signature_algorithm: String,
    #[serde(default)]
    pub public_key: Option<String>,
    pub payload: SignaturePayload,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewArtifactSignature {
    pub fn new(
        artifact_id: Uuid,
        repository_id: Uuid,
        signature_format: SignatureFormat,
        signature_data: Vec<u8>,
        signature_algorithm: impl Into<String>,
        payload: SignaturePayload,
    ) -> Self {
        Self {
            id: None,
            artifact_id,
            repository_id,
            signature_format,
            signature_data,
            signature_algorithm: signature_algorithm.into(),
            public_key: None,
            payload,
            signed_at: None,
            expires_at: None,
        }
    }

    pub fn signature_type(&self) -> SignatureType {
        self.payload.signature_type()
    }
}
