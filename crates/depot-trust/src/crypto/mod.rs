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

//! Cryptographic building blocks.
//!
//! - [`integrity`]: dual SHA-256/SHA-512 content hashing and `algorithm:hex` digests
//! - [`signing`]: SPKI public keys and raw signature checks (ECDSA P-256, Ed25519)
//! - [`certificate`]: X.509 signing-certificate parsing and issuer-chain validation

pub mod certificate;
pub mod integrity;
pub mod signing;

pub use certificate::{CertificateError, CertificatePool, SigningCertificate};
pub use integrity::{ContentDigest, IntegrityError, IntegrityHash, IntegrityHasher};
pub use signing::{CryptoError, SpkiPublicKey};
