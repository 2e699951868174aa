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

//! SPKI public keys and raw signature checks.
//!
//! Supports the two key types used for blob and container signing:
//! ECDSA over NIST P-256 with SHA-256, and Ed25519. Keys are exchanged as
//! PEM-encoded SubjectPublicKeyInfo; fingerprints are SHA-256 over the SPKI DER.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::Verifier;
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::pkcs8::DecodePublicKey;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// PEM tag for SubjectPublicKeyInfo.
const PUBLIC_KEY_PEM_TAG: &str = "PUBLIC KEY";

/// SubjectPublicKeyInfo prefix for an Ed25519 key (OID 1.3.101.112).
const ED25519_DER_PREFIX: [u8; 12] = [
    0x30, 0x2a, // SEQUENCE, 42 bytes
    0x30, 0x05, // SEQUENCE, 5 bytes (algorithm identifier)
    0x06, 0x03, // OID, 3 bytes
    0x2b, 0x65, 0x70, // 1.3.101.112
    0x03, 0x21, // BIT STRING, 33 bytes
    0x00, // unused bits
];

/// Errors from key decoding and signature checks.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid PEM: {0}")]
    InvalidPem(String),

    #[error("Unsupported public key: {0}")]
    UnsupportedKey(String),

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Ed25519 verification needs the artifact bytes, not only its digest")]
    MessageRequired,
}

#[derive(Debug, Clone)]
enum KeyMaterial {
    EcdsaP256(p256::ecdsa::VerifyingKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

/// A decoded SubjectPublicKeyInfo.
#[derive(Debug, Clone)]
pub struct SpkiPublicKey {
    der: Vec<u8>,
    key: KeyMaterial,
}

impl SpkiPublicKey {
    /// Decodes a `PUBLIC KEY` PEM block.
    pub fn from_pem(pem_str: &str) -> Result<Self, CryptoError> {
        let pem = pem::parse(pem_str.trim()).map_err(|e| CryptoError::InvalidPem(e.to_string()))?;
        if pem.tag() != PUBLIC_KEY_PEM_TAG {
            return Err(CryptoError::InvalidPem(format!(
                "Expected tag '{}', got '{}'",
                PUBLIC_KEY_PEM_TAG,
                pem.tag()
            )));
        }
        Self::from_der(pem.contents())
    }

    /// Decodes SubjectPublicKeyInfo DER.
    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        if der.len() == ED25519_DER_PREFIX.len() + 32 && der.starts_with(&ED25519_DER_PREFIX) {
            let mut raw = [0u8; 32];
            raw.copy_from_slice(&der[ED25519_DER_PREFIX.len()..]);
            let key = ed25519_dalek::VerifyingKey::from_bytes(&raw)
                .map_err(|e| CryptoError::UnsupportedKey(e.to_string()))?;
            return Ok(Self {
                der: der.to_vec(),
                key: KeyMaterial::Ed25519(key),
            });
        }

        let key = p256::ecdsa::VerifyingKey::from_public_key_der(der).map_err(|e| {
            CryptoError::UnsupportedKey(format!("not an Ed25519 or P-256 key: {}", e))
        })?;
        Ok(Self {
            der: der.to_vec(),
            key: KeyMaterial::EcdsaP256(key),
        })
    }

    /// SubjectPublicKeyInfo DER.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new(PUBLIC_KEY_PEM_TAG, self.der.clone()))
    }

    /// SHA-256 over the SPKI DER.
    pub fn spki_sha256(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(&self.der));
        out
    }

    /// Uppercase hex of [`spki_sha256`](Self::spki_sha256), the trust-store fingerprint.
    pub fn fingerprint(&self) -> String {
        hex::encode_upper(self.spki_sha256())
    }

    pub fn algorithm(&self) -> &'static str {
        match self.key {
            KeyMaterial::EcdsaP256(_) => "ECDSA-P256-SHA256",
            KeyMaterial::Ed25519(_) => "Ed25519",
        }
    }

    pub fn key_size(&self) -> i32 {
        256
    }

    /// Checks a signature over an artifact.
    ///
    /// ECDSA keys verify against the SHA-256 prehash; Ed25519 keys sign the
    /// message itself and need `message`.
    pub fn verify(
        &self,
        message: Option<&[u8]>,
        sha256: &[u8; 32],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        match &self.key {
            KeyMaterial::EcdsaP256(key) => verify_p256_prehash(key, sha256, signature),
            KeyMaterial::Ed25519(key) => {
                let message = message.ok_or(CryptoError::MessageRequired)?;
                let sig: [u8; 64] = signature.try_into().map_err(|_| {
                    CryptoError::MalformedSignature(format!(
                        "expected 64 bytes, got {}",
                        signature.len()
                    ))
                })?;
                key.verify(message, &ed25519_dalek::Signature::from_bytes(&sig))
                    .map_err(|_| CryptoError::VerificationFailed)
            }
        }
    }

    /// Checks a signature over an arbitrary message.
    pub fn verify_message(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(message));
        self.verify(Some(message), &digest, signature)
    }
}

/// ECDSA P-256 check of a DER or fixed-width (r || s) signature over a prehash.
pub fn verify_p256_prehash(
    key: &p256::ecdsa::VerifyingKey,
    prehash: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    let sig = p256::ecdsa::Signature::from_der(signature)
        .or_else(|_| p256::ecdsa::Signature::from_slice(signature))
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
    key.verify_prehash(prehash, &sig)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// Returns raw signature bytes from either raw DER or base64 text.
///
/// Cosign writes signatures as base64 text files; other tools store the raw
/// bytes. Raw DER always contains bytes outside the base64 alphabet.
pub fn decode_signature_bytes(data: &[u8]) -> Vec<u8> {
    let text: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    match STANDARD.decode(&text) {
        Ok(decoded) if !decoded.is_empty() => decoded,
        _ => data.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Signer;
    use p256::pkcs8::EncodePublicKey;

    fn p256_pair() -> (p256::ecdsa::SigningKey, SpkiPublicKey) {
        let signing = p256::ecdsa::SigningKey::from_bytes(&[7u8; 32].into()).unwrap();
        let der = signing.verifying_key().to_public_key_der().unwrap();
        let public = SpkiPublicKey::from_der(der.as_bytes()).unwrap();
        (signing, public)
    }

    fn ed25519_pair() -> (ed25519_dalek::SigningKey, SpkiPublicKey) {
        let signing = ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]);
        let mut der = ED25519_DER_PREFIX.to_vec();
        der.extend_from_slice(&signing.verifying_key().to_bytes());
        let public = SpkiPublicKey::from_der(&der).unwrap();
        (signing, public)
    }

    #[test]
    fn test_p256_sign_and_verify() {
        let (signing, public) = p256_pair();
        let signature: p256::ecdsa::Signature = signing.sign(b"artifact");

        assert_eq!(public.algorithm(), "ECDSA-P256-SHA256");
        assert!(public
            .verify_message(b"artifact", signature.to_der().as_bytes())
            .is_ok());
        assert!(public.verify_message(b"artifact", &signature.to_bytes()).is_ok());
        assert!(matches!(
            public.verify_message(b"artifacT", signature.to_der().as_bytes()),
            Err(CryptoError::VerificationFailed)
        ));
    }

    #[test]
    fn test_ed25519_sign_and_verify() {
        use ed25519_dalek::Signer as _;
        let (signing, public) = ed25519_pair();
        let signature = signing.sign(b"artifact").to_bytes();

        assert_eq!(public.algorithm(), "Ed25519");
        assert!(public.verify_message(b"artifact", &signature).is_ok());
        assert!(matches!(
            public.verify_message(b"tampered", &signature),
            Err(CryptoError::VerificationFailed)
        ));

        let digest = [0u8; 32];
        assert!(matches!(
            public.verify(None, &digest, &signature),
            Err(CryptoError::MessageRequired)
        ));
    }

    #[test]
    fn test_pem_round_trip_and_fingerprint() {
        let (_, public) = p256_pair();
        let reparsed = SpkiPublicKey::from_pem(&public.to_pem()).unwrap();
        assert_eq!(reparsed.der(), public.der());
        assert_eq!(reparsed.fingerprint(), public.fingerprint());
        assert_eq!(public.fingerprint().len(), 64);
        assert_eq!(public.fingerprint(), public.fingerprint().to_uppercase());
    }

    #[test]
    fn test_rejects_wrong_pem_tag_and_garbage() {
        let (_, public) = p256_pair();
        let wrong = pem::encode(&pem::Pem::new("CERTIFICATE", public.der().to_vec()));
        assert!(matches!(
            SpkiPublicKey::from_pem(&wrong),
            Err(CryptoError::InvalidPem(_))
        ));
        assert!(SpkiPublicKey::from_pem("not pem").is_err());
        assert!(matches!(
            SpkiPublicKey::from_der(&[0x30, 0x03, 0x02, 0x01, 0x00]),
            Err(CryptoError::UnsupportedKey(_))
        ));
    }

    #[test]
    fn test_decode_signature_bytes() {
        let (signing, _) = p256_pair();
        let signature: p256::ecdsa::Signature = signing.sign(b"artifact");
        let der = signature.to_der().as_bytes().to_vec();

        assert_eq!(decode_signature_bytes(&der), der);
        let text = format!("{}\n", STANDARD.encode(&der));
        assert_eq!(decode_signature_bytes(text.as_bytes()), der);
    }

    #[test]
    fn test_malformed_signature() {
        let (_, public) = p256_pair();
        assert!(matches!(
            public.verify_message(b"artifact", &[1, 2, 3]),
            Err(CryptoError::MalformedSignature(_))
        ));
    }
}
