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

//! Content integrity hashing.
//!
//! Every artifact is hashed once with both SHA-256 (the canonical digest used
//! for cross-system comparison and as signature input) and SHA-512. Both
//! digests are fed from the same pass over the bytes.
//!
//! ```rust
//! use depot_trust::crypto::integrity::{ContentDigest, IntegrityHasher};
//!
//! let hash = IntegrityHasher::hash_bytes(b"0123456789");
//! let digest: ContentDigest = hash.to_prefixed().parse().unwrap();
//! assert_eq!(digest.algorithm(), "sha256");
//! assert_eq!(digest.to_string(), hash.to_prefixed());
//! ```

use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Canonical digest algorithm.
pub const CANONICAL_ALGORITHM: &str = "sha256";

const READ_BUFFER: usize = 64 * 1024;

/// Errors raised while hashing or parsing digests.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("Failed to read content: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid digest '{input}': {reason}")]
    InvalidDigest {
        /// Rejected input
        input: String,
        /// What was wrong with it
        reason: &'static str,
    },
}

/// SHA-256 and SHA-512 digests of one byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegrityHash {
    pub sha256: [u8; 32],
    pub sha512: [u8; 64],
    /// Number of bytes hashed
    pub size: u64,
}

impl IntegrityHash {
    /// Always [`CANONICAL_ALGORITHM`].
    pub fn algorithm(&self) -> &'static str {
        CANONICAL_ALGORITHM
    }

    pub fn sha256_hex(&self) -> String {
        hex::encode(self.sha256)
    }

    pub fn sha512_hex(&self) -> String {
        hex::encode(self.sha512)
    }

    /// `sha256:<hex>`
    pub fn to_prefixed(&self) -> String {
        format_prefixed(CANONICAL_ALGORITHM, &self.sha256_hex())
    }

    /// `sha512:<hex>`
    pub fn sha512_prefixed(&self) -> String {
        format_prefixed("sha512", &self.sha512_hex())
    }
}

/// Streaming dual-digest hasher.
///
/// Implements [`io::Write`], so it can be the sink of [`io::copy`].
#[derive(Clone, Default)]
pub struct IntegrityHasher {
    sha256: Sha256,
    sha512: Sha512,
    size: u64,
}

impl IntegrityHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.sha256.update(chunk);
        self.sha512.update(chunk);
        self.size += chunk.len() as u64;
    }

    pub fn finalize(self) -> IntegrityHash {
        let mut sha256 = [0u8; 32];
        sha256.copy_from_slice(&self.sha256.finalize());
        let mut sha512 = [0u8; 64];
        sha512.copy_from_slice(&self.sha512.finalize());
        IntegrityHash {
            sha256,
            sha512,
            size: self.size,
        }
    }

    /// Hashes an in-memory buffer.
    pub fn hash_bytes(bytes: &[u8]) -> IntegrityHash {
        let mut hasher = Self::new();
        hasher.update(bytes);
        hasher.finalize()
    }

    /// Hashes a blocking reader to its end.
    pub fn hash_reader<R: Read>(mut reader: R) -> Result<IntegrityHash, IntegrityError> {
        let mut hasher = Self::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(hasher.finalize())
    }

    /// Hashes an async reader to its end without buffering it whole.
    pub async fn hash_async_reader<R: AsyncRead + Unpin>(
        mut reader: R,
    ) -> Result<IntegrityHash, IntegrityError> {
        let mut hasher = Self::new();
        let mut buffer = vec![0u8; READ_BUFFER];
        loop {
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        Ok(hasher.finalize())
    }
}

impl Write for IntegrityHasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Checks `bytes` against an expected SHA-256, given as hex or `sha256:<hex>`.
///
/// A mismatch, including an unparseable expectation, is `false`, not an error.
pub fn verify(bytes: &[u8], expected_sha256: &str) -> bool {
    matches_sha256(&IntegrityHasher::hash_bytes(bytes), expected_sha256)
}

/// Streaming form of [`verify`]. Only read failures are errors.
pub fn verify_reader<R: Read>(reader: R, expected_sha256: &str) -> Result<bool, IntegrityError> {
    let hash = IntegrityHasher::hash_reader(reader)?;
    Ok(matches_sha256(&hash, expected_sha256))
}

fn matches_sha256(hash: &IntegrityHash, expected: &str) -> bool {
    let expected = expected.trim();
    let expected = expected
        .strip_prefix("sha256:")
        .unwrap_or(expected);
    match hex::decode(expected) {
        Ok(bytes) => bytes.as_slice() == hash.sha256.as_slice(),
        Err(_) => false,
    }
}

/// Formats `algorithm:hex`.
pub fn format_prefixed(algorithm: &str, hex_digest: &str) -> String {
    format!("{}:{}", algorithm, hex_digest)
}

/// A digest in `algorithm:hex` form, as used for OCI content addressing.
///
/// Parsing keeps the input spelling, so formatting a parsed digest yields the
/// original string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest {
    algorithm: String,
    hex: String,
}

impl ContentDigest {
    pub fn parse(input: &str) -> Result<Self, IntegrityError> {
        let invalid = |reason| IntegrityError::InvalidDigest {
            input: input.to_string(),
            reason,
        };

        let mut parts = input.split(':');
        let (algorithm, hex_digest) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(h), None) => (a, h),
            _ => return Err(invalid("expected exactly one ':' separator")),
        };

        if algorithm.is_empty() {
            return Err(invalid("empty algorithm"));
        }
        if !algorithm
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+._-".contains(c))
        {
            return Err(invalid("algorithm contains invalid characters"));
        }
        if hex_digest.is_empty() {
            return Err(invalid("empty digest"));
        }
        if !hex_digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("digest is not hexadecimal"));
        }
        let expected_len = match algorithm {
            "sha256" => Some(64),
            "sha512" => Some(128),
            _ => None,
        };
        if expected_len.is_some_and(|len| len != hex_digest.len()) {
            return Err(invalid("digest length does not match algorithm"));
        }

        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex_digest.to_string(),
        })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Decoded digest bytes.
    pub fn bytes(&self) -> Vec<u8> {
        // Validated as hex in parse.
        hex::decode(&self.hex).unwrap_or_default()
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for ContentDigest {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
