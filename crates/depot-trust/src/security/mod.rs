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

//! Signature verification, the trusted-key store and policy enforcement.
//!
//! This module provides:
//! - [`SignatureVerifier`] trait with [`CosignVerifier`] and [`PgpVerifier`]
//! - [`TrustContext`], the per-verification view of the trust store
//! - [`SignatureService`] orchestrating storage, verification and audit records
//! - [`enforcement`] upload and serving gates
//! - Transparency log access and offline proof checks
//! - Security audit logging for SIEM integration

pub mod admin;
pub mod audit;
mod cosign;
pub mod enforcement;
pub mod log_proof;
mod pgp_verifier;
mod service;
mod transparency_log;
mod trust_context;
mod verifier;

pub use admin::{AddPublicKeyRequest, AdminError, RevokeKeyRequest, UpdateKeyRequest};
pub use cosign::CosignVerifier;
pub use enforcement::{check_download, check_upload, EnforcementError};
pub use log_proof::{HashedRekord, LogProofError};
pub use pgp_verifier::{PgpError, PgpVerifier};
pub use service::{ServiceError, SignatureService, VerificationOutcome};
pub use transparency_log::{
    EntryVerification, InclusionProof, LogEntry, RekorClient, StaticLog, TransparencyLog,
    TransparencyLogError,
};
pub use trust_context::TrustContext;
pub use verifier::{ArtifactInput, SignatureVerifier, VerifyError};
