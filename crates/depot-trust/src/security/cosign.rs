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

//! Cosign-style signature verification.
//!
//! Two modes are supported:
//! - keyless: a short-lived signing certificate plus a transparency log
//!   entry. The certificate must chain to a trusted CA and the entry must be
//!   proven against the log key before the signer is trusted.
//! - keyed: an SPKI public key that must be present in the trust store.

use crate::crypto::signing::decode_signature_bytes;
use crate::crypto::{CertificatePool, CryptoError, SigningCertificate, SpkiPublicKey};
use crate::models::{
    messages, ArtifactSignature, CosignPayload, SignatureType, TransparencyLogRecord,
    VerificationResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::log_proof::{self, HashedRekord};
use super::transparency_log::{LogEntry, TransparencyLog};
use super::trust_context::TrustContext;
use super::verifier::{check_contract, ArtifactInput, SignatureVerifier, VerifyError};

const METHOD_KEYLESS: &str = "cosign-keyless";
const METHOD_KEYED: &str = "cosign-key";
const METHOD_UNKNOWN: &str = "cosign";

/// Verifies Cosign signatures in keyless and keyed mode.
#[derive(Clone)]
pub struct CosignVerifier {
    log: Arc<dyn TransparencyLog>,
    ca_pool: Arc<CertificatePool>,
    log_key: Option<SpkiPublicKey>,
    trust: Option<TrustContext>,
}

impl fmt::Debug for CosignVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosignVerifier")
            .field("ca_pool_empty", &self.ca_pool.is_empty())
            .field("log_key", &self.log_key.as_ref().map(SpkiPublicKey::fingerprint))
            .field("trusted_keys", &self.trust.as_ref().map_or(0, |t| t.keys().len()))
            .finish()
    }
}

impl CosignVerifier {
    /// Creates a verifier with no trusted keys.
    ///
    /// Without a log key no keyless signature can be proven, and without a
    /// trust context no keyed signature is trusted.
    pub fn new(
        log: Arc<dyn TransparencyLog>,
        ca_pool: Arc<CertificatePool>,
        log_key: Option<SpkiPublicKey>,
    ) -> Self {
        Self {
            log,
            ca_pool,
            log_key,
            trust: None,
        }
    }

    /// Uses the keys of `trust` for keyed verification.
    pub fn with_trust_context(mut self, trust: TrustContext) -> Self {
        self.trust = Some(trust);
        self
    }

    async fn verify_cosign(
        &self,
        signature: &ArtifactSignature,
        artifact: ArtifactInput<'_>,
    ) -> Result<VerificationResult, VerifyError> {
        check_contract(signature, SignatureType::Cosign)?;
        let payload = signature.payload.as_cosign().cloned().unwrap_or_default();
        let signature_bytes = decode_signature_bytes(&signature.signature_data);
        let now = Utc::now();

        if let Some(pem) = payload.certificate.as_deref() {
            let result = VerificationResult::pending(METHOD_KEYLESS);
            let cert = match SigningCertificate::from_pem(pem) {
                Ok(cert) => cert,
                Err(e) => return Ok(result.invalid(format!("invalid certificate: {}", e))),
            };
            let result = describe_certificate(result, &cert);

            if cert.is_expired_at(now) {
                return Ok(result.expired(messages::CERTIFICATE_EXPIRED));
            }
            if !cert.is_valid_at(now) {
                return Ok(result.invalid("certificate not yet valid"));
            }

            match payload.rekor_log_uuid.as_deref() {
                Some(uuid) if !uuid.trim().is_empty() => {
                    return self
                        .verify_keyless(result, &cert, uuid.trim(), &payload, &signature_bytes, artifact, now)
                        .await;
                }
                _ => {
                    debug!(signature_id = %signature.id, "Certificate without log entry");
                }
            }
        }

        if let Some(pem) = signature.public_key.as_deref() {
            return self.verify_keyed(pem, &signature_bytes, artifact);
        }

        Ok(VerificationResult::pending(METHOD_UNKNOWN).invalid(messages::INSUFFICIENT_DATA))
    }

    #[allow(clippy::too_many_arguments)]
    async fn verify_keyless(
        &self,
        mut result: VerificationResult,
        cert: &SigningCertificate,
        uuid: &str,
        payload: &CosignPayload,
        signature_bytes: &[u8],
        artifact: ArtifactInput<'_>,
        now: DateTime<Utc>,
    ) -> Result<VerificationResult, VerifyError> {
        if self.ca_pool.is_empty() {
            return Ok(result.untrusted(messages::UNTRUSTED_CA));
        }
        if let Err(e) = self.ca_pool.verify(cert, now) {
            debug!(subject = %cert.summary().subject, "Certificate rejected: {}", e);
            return Ok(result.untrusted(messages::UNTRUSTED_CA));
        }

        let Some(log_key) = self.log_key.as_ref() else {
            warn!("No transparency log key configured; keyless signatures cannot be proven");
            return Ok(result.untrusted(format!(
                "{}: no log key configured",
                messages::LOG_ENTRY_NOT_PROVEN
            )));
        };

        let entry = match self.log.get_entry(uuid).await {
            Ok(entry) => entry,
            Err(e) if e.is_unavailable() => return Err(VerifyError::Unavailable(e)),
            Err(e) => {
                return Ok(result.untrusted(format!("{}: {}", messages::LOG_ENTRY_NOT_PROVEN, e)))
            }
        };
        result.transparency_log = Some(TransparencyLogRecord {
            uuid: entry.uuid.clone(),
            log_index: Some(entry.log_index),
            integrated_time: Some(entry.integrated_time),
            raw_entry: Some(entry.raw.clone()),
        });

        let rekord = match log_proof::verify_entry(&entry, log_key) {
            Ok(rekord) => rekord,
            Err(e) => {
                return Ok(result.untrusted(format!("{}: {}", messages::LOG_ENTRY_NOT_PROVEN, e)))
            }
        };
        if let Err(reason) = check_entry_matches(&entry, &rekord, cert, payload, signature_bytes) {
            return Ok(result.untrusted(format!("{}: {}", messages::LOG_ENTRY_NOT_PROVEN, reason)));
        }
        if rekord.hash_algorithm != "sha256" || rekord.hash_hex != artifact.sha256_hex() {
            return Ok(result.invalid(format!(
                "{}: log entry records a different digest",
                messages::SIGNATURE_MISMATCH
            )));
        }

        check_signature(result, cert.public_key(), signature_bytes, artifact)
    }

    fn verify_keyed(
        &self,
        pem: &str,
        signature_bytes: &[u8],
        artifact: ArtifactInput<'_>,
    ) -> Result<VerificationResult, VerifyError> {
        let mut result = VerificationResult::pending(METHOD_KEYED);
        let key = match SpkiPublicKey::from_pem(pem) {
            Ok(key) => key,
            Err(e) => return Ok(result.invalid(format!("invalid public key: {}", e))),
        };
        result.algorithm = Some(key.algorithm().to_string());
        result.signer_fingerprint = Some(key.fingerprint());

        let Some(stored) = self.trust.as_ref().and_then(|t| t.cosign_key(&key)) else {
            return Ok(result.untrusted(messages::KEY_NOT_IN_TRUST_STORE));
        };
        result.signer_identity = Some(
            stored
                .owner_email
                .clone()
                .unwrap_or_else(|| stored.name.clone()),
        );

        check_signature(result, &key, signature_bytes, artifact)
    }
}

fn describe_certificate(mut result: VerificationResult, cert: &SigningCertificate) -> VerificationResult {
    let summary = cert.summary();
    result.signer_identity = summary.identity().map(str::to_string);
    result.signer_fingerprint = Some(cert.public_key().fingerprint());
    result.algorithm = Some(cert.public_key().algorithm().to_string());
    result.certificate = Some(summary.clone());
    result
}

/// Ties a proven entry to the signature being verified.
fn check_entry_matches(
    entry: &LogEntry,
    rekord: &HashedRekord,
    cert: &SigningCertificate,
    payload: &CosignPayload,
    signature_bytes: &[u8],
) -> Result<(), String> {
    if rekord.signature != signature_bytes {
        return Err("entry records a different signature".to_string());
    }

    let entry_pem = rekord
        .public_key_pem
        .as_deref()
        .ok_or_else(|| "entry has no signing certificate".to_string())?;
    let entry_cert = SigningCertificate::from_pem(entry_pem)
        .map_err(|e| format!("entry certificate: {}", e))?;
    if entry_cert.public_key().spki_sha256() != cert.public_key().spki_sha256() {
        return Err("entry was signed by a different key".to_string());
    }

    let integrated = DateTime::<Utc>::from_timestamp(entry.integrated_time, 0)
        .ok_or_else(|| "integrated time out of range".to_string())?;
    if !cert.is_valid_at(integrated) {
        return Err("entry integrated outside the certificate validity".to_string());
    }

    if let Some(index) = payload.rekor_log_index {
        if index != entry.log_index {
            return Err(format!(
                "log index {} does not match entry index {}",
                index, entry.log_index
            ));
        }
    }
    Ok(())
}

fn check_signature(
    result: VerificationResult,
    key: &SpkiPublicKey,
    signature_bytes: &[u8],
    artifact: ArtifactInput<'_>,
) -> Result<VerificationResult, VerifyError> {
    match key.verify(artifact.bytes(), artifact.sha256(), signature_bytes) {
        Ok(()) => Ok(result.valid()),
        Err(CryptoError::MessageRequired) => Err(VerifyError::ContractViolation(
            CryptoError::MessageRequired.to_string(),
        )),
        Err(CryptoError::VerificationFailed) => Ok(result.invalid(messages::SIGNATURE_MISMATCH)),
        Err(e) => Ok(result.invalid(format!("{}: {}", messages::SIGNATURE_MISMATCH, e))),
    }
}

#[async_trait]
impl SignatureVerifier for CosignVerifier {
    fn signature_type(&self) -> SignatureType {
        SignatureType::Cosign
    }

    async fn verify(
        &self,
        signature: &ArtifactSignature,
        artifact: ArtifactInput<'_>,
    ) -> Result<VerificationResult, VerifyError> {
        self.verify_cosign(signature, artifact).await
    }
}
