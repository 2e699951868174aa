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

//! The verifier contract shared by every signature scheme.

use crate::crypto::{ContentDigest, IntegrityHasher};
use crate::models::{ArtifactSignature, SignatureType, VerificationResult};
use async_trait::async_trait;
use thiserror::Error;

use super::transparency_log::TransparencyLogError;

/// Failures that are not a verification verdict.
///
/// Untrusted or malformed signature material never produces a `VerifyError`;
/// it yields a failed [`VerificationResult`] instead.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The caller passed something the verifier cannot accept.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Verification could not be completed. Safe to retry.
    #[error("Verification could not be completed: {0}")]
    Unavailable(#[from] TransparencyLogError),
}

impl VerifyError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, VerifyError::Unavailable(_))
    }
}

/// Artifact content handed to a verifier.
///
/// The SHA-256 digest is always present. Some schemes (OpenPGP, Ed25519)
/// sign the content itself and also need the bytes.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactInput<'a> {
    bytes: Option<&'a [u8]>,
    sha256: [u8; 32],
}

impl<'a> ArtifactInput<'a> {
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        let hash = IntegrityHasher::hash_bytes(bytes);
        Self {
            bytes: Some(bytes),
            sha256: hash.sha256,
        }
    }

    /// Digest-only input for schemes that sign a prehash.
    pub fn from_digest(digest: &ContentDigest) -> Result<Self, VerifyError> {
        if digest.algorithm() != "sha256" {
            return Err(VerifyError::ContractViolation(format!(
                "artifact digest must be sha256, got {}",
                digest.algorithm()
            )));
        }
        let bytes = digest.bytes();
        let sha256 = <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
            VerifyError::ContractViolation("sha256 digest must be 32 bytes".to_string())
        })?;
        Ok(Self {
            bytes: None,
            sha256,
        })
    }

    pub fn bytes(&self) -> Option<&'a [u8]> {
        self.bytes
    }

    pub fn sha256(&self) -> &[u8; 32] {
        &self.sha256
    }

    pub fn sha256_hex(&self) -> String {
        hex::encode(self.sha256)
    }
}

/// Verifies one stored signature against artifact content.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Scheme this verifier handles.
    fn signature_type(&self) -> SignatureType;

    async fn verify(
        &self,
        signature: &ArtifactSignature,
        artifact: ArtifactInput<'_>,
    ) -> Result<VerificationResult, VerifyError>;
}

/// Rejects records the verifier was never meant to see.
pub(crate) fn check_contract(
    signature: &ArtifactSignature,
    expected: SignatureType,
) -> Result<(), VerifyError> {
    if signature.signature_type() != expected {
        return Err(VerifyError::ContractViolation(format!(
            "{} verifier cannot verify a {} signature",
            expected,
            signature.signature_type()
        )));
    }
    if signature.signature_data.is_empty() {
        return Err(VerifyError::ContractViolation(
            "signature data is empty".to_string(),
        ));
    }
    Ok(())
}
