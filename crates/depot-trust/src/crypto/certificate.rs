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

//! X.509 signing certificates.
//!
//! Keyless signatures come with a short-lived certificate issued by a
//! certificate authority. This module extracts the signer identity from it
//! and checks that it chains to one of the configured trusted roots.
//!
//! Chain building follows issuer names and issuer signatures up to a
//! self-signed anchor. Every issuer must be a CA allowed to sign
//! certificates within its path length, and the leaf must be issued for
//! code signing. Revocation is not checked; signing certificates are
//! short-lived.

use super::signing::{CryptoError, SpkiPublicKey};
use crate::models::CertificateSummary;
use chrono::{DateTime, Utc};
use thiserror::Error;
use x509_cert::der::asn1::{ObjectIdentifier, Utf8StringRef};
use x509_cert::der::{Decode, DecodePem, Encode};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName};
use x509_cert::Certificate;

const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
const CODE_SIGNING: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.3");
/// OIDC issuer, raw string value.
const OIDC_ISSUER_V1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.1");
/// OIDC issuer, DER UTF8String value.
const OIDC_ISSUER_V2: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.8");

/// Longest issuer chain walked above the leaf.
const MAX_CHAIN_DEPTH: usize = 4;

/// Errors from certificate handling.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("Invalid certificate: {0}")]
    Parse(String),

    #[error("Certificate validity out of range")]
    InvalidValidity,

    #[error("Unsupported certificate key: {0}")]
    Key(#[from] CryptoError),

    #[error("Certificate not issued by a trusted CA")]
    UntrustedIssuer,

    #[error("Certificate not issued for code signing")]
    NotCodeSigning,
}

/// A parsed signing certificate.
#[derive(Debug, Clone)]
pub struct SigningCertificate {
    cert: Certificate,
    summary: CertificateSummary,
    public_key: SpkiPublicKey,
}

impl SigningCertificate {
    /// Parses a single PEM `CERTIFICATE` block.
    pub fn from_pem(pem: &str) -> Result<Self, CertificateError> {
        let normalized = format!("{}\n", pem.trim());
        let cert = Certificate::from_pem(normalized.as_bytes())
            .map_err(|e| CertificateError::Parse(e.to_string()))?;
        Self::from_certificate(cert)
    }

    fn from_certificate(cert: Certificate) -> Result<Self, CertificateError> {
        let summary = summarize(&cert)?;
        let public_key = certificate_key(&cert)?;
        Ok(Self {
            cert,
            summary,
            public_key,
        })
    }

    pub fn summary(&self) -> &CertificateSummary {
        &self.summary
    }

    /// Key the certificate was issued for.
    pub fn public_key(&self) -> &SpkiPublicKey {
        &self.public_key
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.summary.not_before <= at && at <= self.summary.not_after
    }

    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        at > self.summary.not_after
    }
}

/// Trusted certificate authorities.
#[derive(Debug, Clone, Default)]
pub struct CertificatePool {
    anchors: Vec<Certificate>,
    intermediates: Vec<Certificate>,
}

impl CertificatePool {
    /// Loads every `CERTIFICATE` block of a PEM bundle. Self-signed
    /// certificates become anchors; the rest are intermediates.
    pub fn from_pem_bundle(bundle: &str) -> Result<Self, CertificateError> {
        let blocks = pem::parse_many(bundle).map_err(|e| CertificateError::Parse(e.to_string()))?;

        let mut pool = Self::default();
        for block in blocks.iter().filter(|b| b.tag() == "CERTIFICATE") {
            let cert = Certificate::from_der(block.contents())
                .map_err(|e| CertificateError::Parse(e.to_string()))?;
            if cert.tbs_certificate.subject == cert.tbs_certificate.issuer {
                pool.anchors.push(cert);
            } else {
                pool.intermediates.push(cert);
            }
        }
        Ok(pool)
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Checks that `leaf` is a code-signing certificate chaining to an
    /// anchor valid at `at`.
    pub fn verify(&self, leaf: &SigningCertificate, at: DateTime<Utc>) -> Result<(), CertificateError> {
        if !is_code_signing(&leaf.cert) {
            return Err(CertificateError::NotCodeSigning);
        }

        let mut current = &leaf.cert;
        for intermediates_below in 0..MAX_CHAIN_DEPTH {
            let can_sign = |issuer: &Certificate| {
                current.tbs_certificate.issuer == issuer.tbs_certificate.subject
                    && valid_at(issuer, at)
                    && may_issue(issuer, intermediates_below)
                    && issued_by(current, issuer)
            };

            if self.anchors.iter().any(can_sign) {
                return Ok(());
            }
            match self.intermediates.iter().find(|c| can_sign(c)) {
                Some(next) => current = next,
                None => break,
            }
        }

        Err(CertificateError::UntrustedIssuer)
    }
}

/// The leaf must name code signing among its extended key usages and, when
/// it restricts key usage, allow digital signatures.
fn is_code_signing(cert: &Certificate) -> bool {
    let tbs = &cert.tbs_certificate;
    let purpose = matches!(
        tbs.get::<ExtendedKeyUsage>(),
        Ok(Some((_, usage))) if usage.0.contains(&CODE_SIGNING)
    );
    let key_usage = match tbs.get::<KeyUsage>() {
        Ok(Some((_, usage))) => usage.digital_signature(),
        Ok(None) => true,
        Err(_) => false,
    };
    purpose && key_usage
}

/// Whether `issuer` may sign a certificate with `intermediates_below`
/// non-leaf certificates under it: a CA within its path length whose key
/// usage, when present, includes certificate signing.
fn may_issue(issuer: &Certificate, intermediates_below: usize) -> bool {
    let tbs = &issuer.tbs_certificate;
    let within_path = match tbs.get::<BasicConstraints>() {
        Ok(Some((_, constraints))) if constraints.ca => constraints
            .path_len_constraint
            .map_or(true, |max| intermediates_below <= usize::from(max)),
        _ => false,
    };
    let key_usage = match tbs.get::<KeyUsage>() {
        Ok(Some((_, usage))) => usage.key_cert_sign(),
        Ok(None) => true,
        Err(_) => false,
    };
    within_path && key_usage
}

fn certificate_key(cert: &Certificate) -> Result<SpkiPublicKey, CertificateError> {
    let der = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| CertificateError::Parse(e.to_string()))?;
    Ok(SpkiPublicKey::from_der(&der)?)
}

fn issued_by(child: &Certificate, issuer: &Certificate) -> bool {
    let algorithm = child.signature_algorithm.oid;
    if algorithm != ECDSA_WITH_SHA256 && algorithm != ED25519 {
        return false;
    }
    let Ok(issuer_key) = certificate_key(issuer) else {
        return false;
    };
    let Ok(tbs) = child.tbs_certificate.to_der() else {
        return false;
    };
    let Some(signature) = child.signature.as_bytes() else {
        return false;
    };
    issuer_key.verify_message(&tbs, signature).is_ok()
}

fn valid_at(cert: &Certificate, at: DateTime<Utc>) -> bool {
    match validity(cert) {
        Ok((not_before, not_after)) => not_before <= at && at <= not_after,
        Err(_) => false,
    }
}

fn validity(cert: &Certificate) -> Result<(DateTime<Utc>, DateTime<Utc>), CertificateError> {
    let to_utc = |time: &x509_cert::time::Time| {
        let secs = i64::try_from(time.to_unix_duration().as_secs())
            .map_err(|_| CertificateError::InvalidValidity)?;
        DateTime::<Utc>::from_timestamp(secs, 0).ok_or(CertificateError::InvalidValidity)
    };
    let validity = &cert.tbs_certificate.validity;
    Ok((to_utc(&validity.not_before)?, to_utc(&validity.not_after)?))
}

fn summarize(cert: &Certificate) -> Result<CertificateSummary, CertificateError> {
    let tbs = &cert.tbs_certificate;
    let (not_before, not_after) = validity(cert)?;

    let mut email = None;
    let mut uri = None;
    if let Ok(Some((_, san))) = tbs.get::<SubjectAltName>() {
        for name in san.0 {
            match name {
                GeneralName::Rfc822Name(value) if email.is_none() => {
                    email = Some(value.to_string())
                }
                GeneralName::UniformResourceIdentifier(value) if uri.is_none() => {
                    uri = Some(value.to_string())
                }
                _ => {}
            }
        }
    }

    let common_name = tbs.subject.0.iter().find_map(|rdn| {
        rdn.0.iter().find_map(|atv| {
            atv.to_string()
                .strip_prefix("CN=")
                .map(str::to_string)
        })
    });

    Ok(CertificateSummary {
        subject: tbs.subject.to_string(),
        issuer: tbs.issuer.to_string(),
        not_before,
        not_after,
        email,
        uri,
        common_name,
        oidc_issuer: oidc_issuer(cert),
    })
}

fn oidc_issuer(cert: &Certificate) -> Option<String> {
    let extensions = cert.tbs_certificate.extensions.as_ref()?;

    let v2 = extensions.iter().find(|e| e.extn_id == OIDC_ISSUER_V2);
    if let Some(ext) = v2 {
        if let Ok(value) = Utf8StringRef::from_der(ext.extn_value.as_bytes()) {
            return Some(value.as_str().to_string());
        }
    }

    extensions
        .iter()
        .find(|e| e.extn_id == OIDC_ISSUER_V1)
        .and_then(|ext| String::from_utf8(ext.extn_value.as_bytes().to_vec()).ok())
}
