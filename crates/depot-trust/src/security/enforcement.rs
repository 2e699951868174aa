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

//! Upload and serving gates.
//!
//! Pure decisions over a [`RepositorySignaturePolicy`]. Callers load the
//! policy and the artifact's signatures; nothing here touches storage.

use crate::models::{ArtifactSignature, RepositorySignaturePolicy, VerificationStatus};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a gate refused an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnforcementError {
    #[error("repository policy '{policy}' requires a signature on upload")]
    SignatureRequired { policy: String },

    #[error("artifact has no valid signature")]
    NoValidSignature,

    #[error("no valid signature from an allowed signer")]
    SignerNotAllowed,
}

impl EnforcementError {
    /// Stable reason code for audit records and API responses.
    pub fn code(&self) -> &'static str {
        match self {
            EnforcementError::SignatureRequired { .. } => "signature_required",
            EnforcementError::NoValidSignature => "no_valid_signature",
            EnforcementError::SignerNotAllowed => "signer_not_allowed",
        }
    }
}

/// Whether an upload may proceed. Runs before any verification.
pub fn check_upload(
    policy: &RepositorySignaturePolicy,
    has_signature: bool,
) -> Result<(), EnforcementError> {
    if policy.signature_required() && !has_signature {
        return Err(EnforcementError::SignatureRequired {
            policy: policy.signature_policy().to_string(),
        });
    }
    Ok(())
}

/// Whether an artifact may be served.
///
/// With enforcement active, at least one signature must be valid, unexpired,
/// of an enabled scheme and, when the allow-list is non-empty, from a listed
/// signer.
pub fn check_download(
    policy: &RepositorySignaturePolicy,
    signatures: &[ArtifactSignature],
) -> Result<(), EnforcementError> {
    check_download_at(policy, signatures, Utc::now())
}

pub fn check_download_at(
    policy: &RepositorySignaturePolicy,
    signatures: &[ArtifactSignature],
    now: DateTime<Utc>,
) -> Result<(), EnforcementError> {
    if !policy.verification_enforced() {
        return Ok(());
    }

    let valid = signatures.iter().filter(|s| {
        s.status() == VerificationStatus::Valid
            && s.verification.verified
            && !s.is_expired_at(now)
            && policy.scheme_enabled(s.signature_type())
    });

    let mut any_valid = false;
    for signature in valid {
        any_valid = true;
        if policy.signer_allowed(signature.signer_identity.as_deref()) {
            return Ok(());
        }
    }

    if any_valid {
        Err(EnforcementError::SignerNotAllowed)
    } else {
        Err(EnforcementError::NoValidSignature)
    }
}
