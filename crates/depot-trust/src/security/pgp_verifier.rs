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

//! Detached OpenPGP signature verification against a keyring.
//!
//! Packet parsing and cryptography come from `sequoia-openpgp`. A key only
//! signs when its binding signature is valid under the standard policy and
//! carries the signing flag. Document signatures must use a SHA-2 hash.

use crate::models::{
    messages, normalize_fingerprint, ArtifactSignature, KeySource, KeyType, NewPublicKey,
    PublicKey, SignatureType, VerificationResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sequoia_openpgp as openpgp;
use openpgp::cert::CertParser;
use openpgp::crypto::mpi;
use openpgp::packet::{Signature, UserID};
use openpgp::parse::Parse;
use openpgp::policy::StandardPolicy;
use openpgp::serialize::SerializeInto;
use openpgp::types::{Curve, HashAlgorithm, PublicKeyAlgorithm, RevocationStatus};
use openpgp::{Cert, KeyHandle, Packet, PacketPile};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, warn};

use super::verifier::{check_contract, ArtifactInput, SignatureVerifier, VerifyError};

const METHOD: &str = "pgp";

/// Errors raised while reading OpenPGP key material.
#[derive(Debug, Error)]
pub enum PgpError {
    #[error("Malformed OpenPGP data: {0}")]
    Malformed(String),

    #[error("No public key found in input")]
    NoKey,

    #[error("Expected one certificate, found {0}")]
    MultipleCertificates(usize),

    #[error("Failed to armor key: {0}")]
    Armor(String),
}

/// Verifies detached OpenPGP signatures.
///
/// Keys are added with [`add_public_key`](Self::add_public_key) or
/// [`add_trusted_keys`](Self::add_trusted_keys). The keyring sits behind a
/// read-write lock so verification never observes a half-imported key.
#[derive(Debug, Default)]
pub struct PgpVerifier {
    keyring: RwLock<Vec<Cert>>,
}

impl PgpVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Imports armored or binary key material. Returns the fingerprints added.
    pub fn add_public_key(&self, material: &[u8]) -> Result<Vec<String>, PgpError> {
        let certs = parse_certs(material)?;
        let fingerprints = certs.iter().map(|c| c.fingerprint().to_hex()).collect();
        self.keyring.write().extend(certs);
        Ok(fingerprints)
    }

    /// Imports the OpenPGP keys that satisfy the trust predicate at `now`.
    ///
    /// Keys of other types, and disabled, revoked, untrusted or out-of-window
    /// keys never reach the keyring. Only the certificate whose primary
    /// fingerprint is the stored fingerprint is taken from each record;
    /// anything else in the material is ignored. Returns the number of
    /// certificates imported.
    pub fn add_trusted_keys(&self, keys: &[PublicKey], now: DateTime<Utc>) -> usize {
        let mut imported = Vec::new();
        for key in keys {
            if key.key_type != KeyType::Pgp || !key.is_usable_at(now) {
                continue;
            }
            let certs = match parse_certs(key.key_material.as_bytes()) {
                Ok(certs) => certs,
                Err(e) => {
                    warn!(
                        key_id = %key.id,
                        fingerprint = %key.fingerprint,
                        "Skipping unparseable trusted key: {}", e
                    );
                    continue;
                }
            };

            let expected = normalize_fingerprint(&key.fingerprint);
            let total = certs.len();
            match certs
                .into_iter()
                .find(|c| c.fingerprint().to_hex() == expected)
            {
                Some(cert) => {
                    if total > 1 {
                        warn!(
                            key_id = %key.id,
                            fingerprint = %key.fingerprint,
                            ignored = total - 1,
                            "Ignoring extra certificates in trusted key material"
                        );
                    }
                    imported.push(cert);
                }
                None => warn!(
                    key_id = %key.id,
                    fingerprint = %key.fingerprint,
                    "Skipping trusted key whose material does not match its fingerprint"
                ),
            }
        }

        let count = imported.len();
        self.keyring.write().extend(imported);
        count
    }

    pub fn key_count(&self) -> usize {
        self.keyring.read().len()
    }

    /// Verifies a detached signature over the artifact bytes.
    ///
    /// Armored and binary signatures take the same path; the parser detects
    /// armor on its own.
    pub fn verify_detached(
        &self,
        signature: &ArtifactSignature,
        artifact: &[u8],
    ) -> Result<VerificationResult, VerifyError> {
        check_contract(signature, SignatureType::Pgp)?;
        let mut result = VerificationResult::pending(METHOD);

        let mut sig = match parse_signature(&signature.signature_data) {
            Ok(sig) => sig,
            Err(None) => return Ok(result.invalid(messages::NOT_A_SIGNATURE_PACKET)),
            Err(Some(e)) => {
                return Ok(result.invalid(format!("{}: {}", messages::NOT_A_SIGNATURE_PACKET, e)))
            }
        };

        result.algorithm = Some(algorithm_label(&sig));
        let issuers = sig.get_issuers();
        result.signer_fingerprint = issuers.iter().find_map(|h| match h {
            KeyHandle::Fingerprint(fp) => Some(fp.to_hex()),
            KeyHandle::KeyID(_) => None,
        });

        // A key shipped with the signature only describes the signer; it is
        // never trusted unless the same key is in the keyring.
        if let Some(embedded) = signature.public_key.as_deref() {
            describe_embedded_signer(&mut result, embedded, &issuers);
        }

        if !is_collision_resistant(sig.hash_algo()) {
            return Ok(result.invalid(format!(
                "{}: {}",
                messages::WEAK_HASH_ALGORITHM,
                sig.hash_algo()
            )));
        }

        let policy = StandardPolicy::new();
        let signed_at = sig.signature_creation_time();
        let keyring = self.keyring.read();

        let mut candidates = Vec::new();
        for cert in keyring.iter() {
            let Ok(valid) = cert.with_policy(&policy, signed_at) else {
                continue;
            };
            if valid.alive().is_err()
                || matches!(valid.revocation_status(), RevocationStatus::Revoked(_))
            {
                continue;
            }
            for ka in valid.keys().for_signing().alive().revoked(false) {
                let handle = ka.key().key_handle();
                if issuers.iter().any(|issuer| issuer.aliases(&handle)) {
                    candidates.push((cert, ka.key().clone()));
                }
            }
        }

        let Some((first, _)) = candidates.first() else {
            debug!(issuers = ?issuers, "No bound signing key in keyring");
            return Ok(result.untrusted(messages::SIGNER_NOT_IN_KEYRING));
        };
        result.signer_identity = Some(identity(first));
        result.signer_fingerprint = Some(first.fingerprint().to_hex());

        let mut verified = None;
        for (cert, key) in &candidates {
            match sig.verify_message(key, artifact) {
                Ok(()) => {
                    verified = Some(*cert);
                    break;
                }
                Err(e) => debug!(key = %key.fingerprint(), "Signature check failed: {}", e),
            }
        }
        let Some(cert) = verified else {
            return Ok(result.invalid(messages::SIGNATURE_MISMATCH));
        };
        result.signer_identity = Some(identity(cert));
        result.signer_fingerprint = Some(cert.fingerprint().to_hex());

        if sig
            .signature_expiration_time()
            .is_some_and(|at| at < SystemTime::now())
        {
            return Ok(result.expired(messages::SIGNATURE_EXPIRED));
        }

        Ok(result.valid())
    }

    /// Parses standalone key material into a trust-store record.
    ///
    /// The material must hold exactly one certificate, which is stored
    /// armored regardless of input encoding. The key starts untrusted; trust
    /// is an administrative decision.
    pub fn extract_key_info(material: &[u8]) -> Result<NewPublicKey, PgpError> {
        let mut certs = parse_certs(material)?;
        if certs.len() > 1 {
            return Err(PgpError::MultipleCertificates(certs.len()));
        }
        let cert = certs.pop().ok_or(PgpError::NoKey)?;

        let armored = cert
            .armored()
            .to_vec()
            .map_err(|e| PgpError::Armor(e.to_string()))?;
        let key_material =
            String::from_utf8(armored).map_err(|e| PgpError::Armor(e.to_string()))?;

        let user_id = primary_user_id(&cert);
        let owner_name = user_id.as_ref().and_then(|u| u.name().ok().flatten());
        let owner_email = user_id.as_ref().and_then(|u| u.email().ok().flatten());
        let key_id = cert.keyid().to_hex();
        let name = owner_name
            .clone()
            .or_else(|| owner_email.clone())
            .unwrap_or_else(|| format!("Key ID: {}", key_id));

        let primary_key = cert.primary_key();
        let primary = primary_key.key();
        let (algorithm, key_size) = describe_key(primary.mpis());
        let mut key = NewPublicKey::new(
            KeyType::Pgp,
            cert.fingerprint().to_hex(),
            key_id,
            algorithm,
            key_material,
            name,
        );
        key.key_size = key_size;
        key.owner_name = owner_name;
        key.owner_email = owner_email;
        key.key_source = KeySource::Imported;
        key.valid_from = Some(DateTime::<Utc>::from(primary.creation_time()));
        Ok(key)
    }
}

fn parse_certs(material: &[u8]) -> Result<Vec<Cert>, PgpError> {
    let certs = CertParser::from_bytes(material)
        .map_err(|e| PgpError::Malformed(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PgpError::Malformed(e.to_string()))?;
    if certs.is_empty() {
        return Err(PgpError::NoKey);
    }
    Ok(certs)
}

/// First packet of the input as a signature. `Err(None)` when the input
/// parses but starts with some other packet.
fn parse_signature(data: &[u8]) -> Result<Signature, Option<String>> {
    let pile = PacketPile::from_bytes(data).map_err(|e| Some(e.to_string()))?;
    match pile.into_children().next() {
        Some(Packet::Signature(sig)) => Ok(sig),
        _ => Err(None),
    }
}

fn is_collision_resistant(hash: HashAlgorithm) -> bool {
    matches!(
        hash,
        HashAlgorithm::SHA224 | HashAlgorithm::SHA256 | HashAlgorithm::SHA384 | HashAlgorithm::SHA512
    )
}

fn algorithm_label(sig: &Signature) -> String {
    let pk = match sig.pk_algo() {
        PublicKeyAlgorithm::RSAEncryptSign => "RSA".to_string(),
        PublicKeyAlgorithm::EdDSA => "EdDSA".to_string(),
        PublicKeyAlgorithm::ECDSA => "ECDSA".to_string(),
        other => other.to_string(),
    };
    format!("{}/{}", pk, sig.hash_algo())
}

/// Algorithm label and, for finite-field keys, the modulus size.
fn describe_key(key: &mpi::PublicKey) -> (String, Option<i32>) {
    let bits = || key.bits().and_then(|b| i32::try_from(b).ok());
    match key {
        mpi::PublicKey::RSA { .. } => ("RSA".to_string(), bits()),
        mpi::PublicKey::DSA { .. } => ("DSA".to_string(), bits()),
        mpi::PublicKey::EdDSA { curve, .. } => (format!("EdDSA-{}", curve_label(curve)), None),
        mpi::PublicKey::ECDSA { curve, .. } => (format!("ECDSA-{}", curve_label(curve)), None),
        _ => ("unknown".to_string(), bits()),
    }
}

fn curve_label(curve: &Curve) -> String {
    match curve {
        Curve::Ed25519 => "Ed25519".to_string(),
        Curve::NistP256 => "P256".to_string(),
        Curve::NistP384 => "P384".to_string(),
        Curve::NistP521 => "P521".to_string(),
        other => other.to_string(),
    }
}

fn primary_user_id(cert: &Cert) -> Option<UserID> {
    let policy = StandardPolicy::new();
    cert.with_policy(&policy, None)
        .ok()
        .and_then(|valid| valid.primary_userid().ok().map(|u| u.userid().clone()))
        .or_else(|| cert.userids().next().map(|u| u.userid().clone()))
}

/// Display identity: email, then name, then `Key ID: <hex>`.
fn identity(cert: &Cert) -> String {
    let user_id = primary_user_id(cert);
    user_id
        .as_ref()
        .and_then(|u| u.email().ok().flatten())
        .or_else(|| user_id.as_ref().and_then(|u| u.name().ok().flatten()))
        .unwrap_or_else(|| format!("Key ID: {}", cert.keyid().to_hex()))
}

fn describe_embedded_signer(result: &mut VerificationResult, material: &str, issuers: &[KeyHandle]) {
    let Ok(certs) = parse_certs(material.as_bytes()) else {
        debug!("Ignoring unparseable embedded public key");
        return;
    };
    if let Some(cert) = certs.iter().find(|cert| {
        cert.keys().any(|ka| {
            let handle = ka.key().key_handle();
            issuers.iter().any(|issuer| issuer.aliases(&handle))
        })
    }) {
        result.signer_identity = Some(identity(cert));
        result.signer_fingerprint = Some(cert.fingerprint().to_hex());
    }
}

#[async_trait]
impl SignatureVerifier for PgpVerifier {
    fn signature_type(&self) -> SignatureType {
        SignatureType::Pgp
    }

    async fn verify(
        &self,
        signature: &ArtifactSignature,
        artifact: ArtifactInput<'_>,
    ) -> Result<VerificationResult, VerifyError> {
        let bytes = artifact.bytes().ok_or_else(|| {
            VerifyError::ContractViolation(
                "OpenPGP verification needs the artifact bytes".to_string(),
            )
        })?;
        self.verify_detached(signature, bytes)
    }
}
