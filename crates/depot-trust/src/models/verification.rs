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

//! Verification status and the result of one verification attempt.

use super::UnknownVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable failure messages. Audit logs are searched by these strings.
pub mod messages {
    pub const SIGNER_NOT_IN_KEYRING: &str = "signer's public key not found in keyring";
    pub const NOT_A_SIGNATURE_PACKET: &str = "not a valid signature packet";
    pub const SIGNATURE_MISMATCH: &str = "signature does not match artifact";
    pub const INSUFFICIENT_DATA: &str = "insufficient data for verification";
    pub const CERTIFICATE_EXPIRED: &str = "certificate expired";
    pub const UNTRUSTED_CA: &str = "certificate not issued by a trusted CA";
    pub const LOG_ENTRY_NOT_PROVEN: &str = "transparency log entry not proven";
    pub const LOG_UNAVAILABLE: &str = "verification incomplete: transparency log unavailable";
    pub const KEY_NOT_IN_TRUST_STORE: &str = "public key not in trust store";
    pub const SCHEME_DISABLED: &str = "signature scheme disabled by repository policy";
    pub const SIGNATURE_EXPIRED: &str = "signature expired";
    pub const WEAK_HASH_ALGORITHM: &str = "signature hash algorithm not accepted";
}

/// Verification status of a signature record.
///
/// `Pending` is the only state a verification may start from. Terminal states
/// are left only through an explicit re-verification, which first returns the
/// record to `Pending`.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Valid,
    Invalid,
    Expired,
    Untrusted,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Valid => "valid",
            VerificationStatus::Invalid => "invalid",
            VerificationStatus::Expired => "expired",
            VerificationStatus::Untrusted => "untrusted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, VerificationStatus::Pending)
    }

    /// Whether a record in this state may move to `next`.
    pub fn can_transition_to(&self, next: VerificationStatus) -> bool {
        match (self, next) {
            (VerificationStatus::Pending, next) => next.is_terminal(),
            // Re-verification request.
            (_, VerificationStatus::Pending) => true,
            _ => false,
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VerificationStatus::Pending),
            "valid" => Ok(VerificationStatus::Valid),
            "invalid" => Ok(VerificationStatus::Invalid),
            "expired" => Ok(VerificationStatus::Expired),
            "untrusted" => Ok(VerificationStatus::Untrusted),
            other => Err(UnknownVariant::new("verification status", other)),
        }
    }
}

/// Details extracted from a signing certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub email: Option<String>,
    pub uri: Option<String>,
    pub common_name: Option<String>,
    /// OIDC issuer recorded by the certificate authority
    pub oidc_issuer: Option<String>,
}

impl CertificateSummary {
    /// Signer identity: SAN email, else SAN URI, else common name.
    pub fn identity(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or(self.uri.as_deref())
            .or(self.common_name.as_deref())
    }
}

/// Transparency log details recorded during keyless verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransparencyLogRecord {
    pub uuid: String,
    pub log_index: Option<i64>,
    pub integrated_time: Option<i64>,
    /// Entry exactly as returned by the log server
    pub raw_entry: Option<serde_json::Value>,
}

/// Outcome of one verification attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verified: bool,
    pub status: VerificationStatus,
    /// Scheme and mode, e.g. `cosign-keyless` or `pgp`
    pub verification_method: String,
    pub error_message: Option<String>,
    pub signer_identity: Option<String>,
    pub signer_fingerprint: Option<String>,
    pub certificate: Option<CertificateSummary>,
    pub transparency_log: Option<TransparencyLogRecord>,
    pub algorithm: Option<String>,
    pub trusted_signer: bool,
}

impl VerificationResult {
    /// A result that has not reached a decision yet.
    pub fn pending(method: impl Into<String>) -> Self {
        Self {
            verified: false,
            status: VerificationStatus::Pending,
            verification_method: method.into(),
            error_message: None,
            signer_identity: None,
            signer_fingerprint: None,
            certificate: None,
            transparency_log: None,
            algorithm: None,
            trusted_signer: false,
        }
    }

    /// Marks the signature valid and its signer trusted.
    pub fn valid(mut self) -> Self {
        self.verified = true;
        self.status = VerificationStatus::Valid;
        self.trusted_signer = true;
        self.error_message = None;
        self
    }

    pub fn invalid(self, message: impl Into<String>) -> Self {
        self.fail(VerificationStatus::Invalid, message)
    }

    pub fn untrusted(self, message: impl Into<String>) -> Self {
        self.fail(VerificationStatus::Untrusted, message)
    }

    pub fn expired(self, message: impl Into<String>) -> Self {
        self.fail(VerificationStatus::Expired, message)
    }

    fn fail(mut self, status: VerificationStatus, message: impl Into<String>) -> Self {
        self.verified = false;
        self.status = status;
        self.trusted_signer = false;
        self.error_message = Some(message.into());
        self
    }

    /// Stable machine-readable code for a failed result.
    pub fn error_code(&self) -> Option<&'static str> {
        match self.status {
            VerificationStatus::Valid | VerificationStatus::Pending => None,
            VerificationStatus::Invalid => Some("signature_invalid"),
            VerificationStatus::Expired => Some("signature_expired"),
            VerificationStatus::Untrusted => Some("signer_untrusted"),
        }
    }
}
