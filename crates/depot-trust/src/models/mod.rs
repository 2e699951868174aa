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

//! Domain models for the trust subsystem.
//!
//! These types carry no Diesel derives. The DAL converts them to and from
//! storage rows at its boundary.

pub mod policy;
pub mod public_key;
pub mod signature;
pub mod tenant;
pub mod verification;
pub mod verification_log;

pub use policy::{PolicySettings, RepositorySignaturePolicy, SignaturePolicy};
pub use public_key::{normalize_fingerprint, KeySource, KeyType, NewPublicKey, PublicKey};
pub use signature::{
    ArtifactSignature, CosignPayload, NewArtifactSignature, PgpPayload, SignatureFormat,
    SignaturePayload, SignatureType, SigstorePayload, VerificationState,
};
pub use tenant::{ActorContext, TenantId};
pub use verification::{
    messages, CertificateSummary, TransparencyLogRecord, VerificationResult, VerificationStatus,
};
pub use verification_log::{LogResult, NewVerificationLog, VerificationLog};

/// Error returned when a stored enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    /// Name of the enum being parsed
    pub kind: &'static str,
    /// Rejected input
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
