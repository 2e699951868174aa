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

//! Offline proof checks for transparency log entries.
//!
//! An entry is accepted only when all of these hold:
//! - the log id is the SHA-256 of the configured log key
//! - the signed entry timestamp verifies over the canonical entry JSON
//! - the uuid names the leaf hash of the body
//! - the inclusion proof leads from that leaf to the proof's root hash
//! - a checkpoint signed by the log key commits to the same root and size

use crate::crypto::SpkiPublicKey;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::transparency_log::LogEntry;

/// Prefix of a checkpoint signature line (U+2014 EM DASH, space).
const CHECKPOINT_SIGNATURE_PREFIX: &str = "\u{2014} ";

const HASHEDREKORD_KIND: &str = "hashedrekord";

/// Why an entry was not accepted as proven.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogProofError {
    #[error("entry has no {0}")]
    Missing(&'static str),

    #[error("log id does not match the log key")]
    LogIdMismatch,

    #[error("signed entry timestamp does not verify")]
    SignedEntryTimestamp,

    #[error("uuid does not match the entry body")]
    UuidMismatch,

    #[error("inclusion proof invalid: {0}")]
    Inclusion(String),

    #[error("checkpoint invalid: {0}")]
    Checkpoint(String),

    #[error("entry body invalid: {0}")]
    Body(String),
}

/// The signed claim recorded by a `hashedrekord` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedRekord {
    pub hash_algorithm: String,
    pub hash_hex: String,
    pub signature: Vec<u8>,
    /// PEM certificate or public key of the signer
    pub public_key_pem: Option<String>,
}

#[derive(Deserialize)]
struct RekordBody {
    kind: String,
    spec: RekordSpec,
}

#[derive(Deserialize)]
struct RekordSpec {
    data: RekordData,
    signature: RekordSignature,
}

#[derive(Deserialize)]
struct RekordData {
    hash: RekordHash,
}

#[derive(Deserialize)]
struct RekordHash {
    algorithm: String,
    value: String,
}

#[derive(Deserialize)]
struct RekordSignature {
    content: String,
    #[serde(rename = "publicKey")]
    public_key: Option<RekordContent>,
}

#[derive(Deserialize)]
struct RekordContent {
    content: String,
}

impl HashedRekord {
    pub fn parse(body: &[u8]) -> Result<Self, LogProofError> {
        let parsed: RekordBody =
            serde_json::from_slice(body).map_err(|e| LogProofError::Body(e.to_string()))?;
        if parsed.kind != HASHEDREKORD_KIND {
            return Err(LogProofError::Body(format!(
                "unsupported entry kind '{}'",
                parsed.kind
            )));
        }
        let signature = STANDARD
            .decode(&parsed.spec.signature.content)
            .map_err(|e| LogProofError::Body(format!("signature: {}", e)))?;
        let public_key_pem = match parsed.spec.signature.public_key {
            Some(key) => {
                let pem = STANDARD
                    .decode(&key.content)
                    .map_err(|e| LogProofError::Body(format!("public key: {}", e)))?;
                Some(
                    String::from_utf8(pem)
                        .map_err(|_| LogProofError::Body("public key is not text".to_string()))?,
                )
            }
            None => None,
        };

        Ok(Self {
            hash_algorithm: parsed.spec.data.hash.algorithm,
            hash_hex: parsed.spec.data.hash.value.to_ascii_lowercase(),
            signature,
            public_key_pem,
        })
    }
}

/// RFC 6962 leaf hash.
pub fn leaf_hash(body: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([0x00]);
    hasher.update(body);
    hasher.finalize().into()
}

fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([0x01]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Checks an RFC 9162 inclusion proof for the leaf at `index` in a tree of `size`.
pub fn verify_inclusion(
    leaf: &[u8; 32],
    index: u64,
    size: u64,
    proof: &[[u8; 32]],
    root: &[u8; 32],
) -> Result<(), LogProofError> {
    if index >= size {
        return Err(LogProofError::Inclusion(format!(
            "index {} outside tree of size {}",
            index, size
        )));
    }

    let mut fn_ = index;
    let mut sn = size - 1;
    let mut computed = *leaf;

    for sibling in proof {
        if sn == 0 {
            return Err(LogProofError::Inclusion("proof too long".to_string()));
        }
        if fn_ & 1 == 1 || fn_ == sn {
            computed = node_hash(sibling, &computed);
            if fn_ & 1 == 0 {
                while fn_ & 1 == 0 && fn_ != 0 {
                    fn_ >>= 1;
                    sn >>= 1;
                }
            }
        } else {
            computed = node_hash(&computed, sibling);
        }
        fn_ >>= 1;
        sn >>= 1;
    }

    if sn != 0 {
        return Err(LogProofError::Inclusion("proof too short".to_string()));
    }
    if &computed != root {
        return Err(LogProofError::Inclusion("root hash mismatch".to_string()));
    }
    Ok(())
}

/// The JSON the log signs for a signed entry timestamp: sorted keys, no whitespace.
pub fn signed_entry_timestamp_payload(entry: &LogEntry) -> String {
    // Hex and base64 strings never need escaping beyond what serde_json adds.
    let quote = |s: &str| serde_json::Value::String(s.to_string()).to_string();
    format!(
        "{{\"body\":{},\"integratedTime\":{},\"logID\":{},\"logIndex\":{}}}",
        quote(&entry.body),
        entry.integrated_time,
        quote(&entry.log_id),
        entry.log_index
    )
}

/// A signed tree head in note format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub origin: String,
    pub size: u64,
    pub root_hash: [u8; 32],
}

impl Checkpoint {
    /// Parses a checkpoint note and checks that the log key signed it.
    pub fn verify(text: &str, log_key: &SpkiPublicKey) -> Result<Self, LogProofError> {
        let split = text
            .find("\n\n")
            .ok_or_else(|| LogProofError::Checkpoint("missing signature block".to_string()))?;
        let note = &text[..split + 1];
        let signatures = &text[split + 2..];

        let mut lines = note.lines();
        let origin = lines
            .next()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| LogProofError::Checkpoint("missing origin".to_string()))?;
        let size = lines
            .next()
            .and_then(|l| l.parse::<u64>().ok())
            .ok_or_else(|| LogProofError::Checkpoint("bad tree size".to_string()))?;
        let root_hash = lines
            .next()
            .and_then(|l| STANDARD.decode(l).ok())
            .and_then(|b| <[u8; 32]>::try_from(b.as_slice()).ok())
            .ok_or_else(|| LogProofError::Checkpoint("bad root hash".to_string()))?;

        let key_hint = &log_key.spki_sha256()[..4];
        let signed = signatures.lines().any(|line| {
            let Some(rest) = line.strip_prefix(CHECKPOINT_SIGNATURE_PREFIX) else {
                return false;
            };
            let Some((_name, encoded)) = rest.rsplit_once(' ') else {
                return false;
            };
            let Ok(raw) = STANDARD.decode(encoded) else {
                return false;
            };
            raw.len() > 4
                && &raw[..4] == key_hint
                && log_key.verify_message(note.as_bytes(), &raw[4..]).is_ok()
        });
        if !signed {
            return Err(LogProofError::Checkpoint(
                "no valid signature from the log key".to_string(),
            ));
        }

        Ok(Self {
            origin: origin.to_string(),
            size,
            root_hash,
        })
    }
}

fn decode_hash(hex_str: &str, what: &str) -> Result<[u8; 32], LogProofError> {
    hex::decode(hex_str)
        .ok()
        .and_then(|b| <[u8; 32]>::try_from(b.as_slice()).ok())
        .ok_or_else(|| LogProofError::Inclusion(format!("malformed {}", what)))
}

/// Runs every offline check on an entry and returns its decoded body.
pub fn verify_entry(entry: &LogEntry, log_key: &SpkiPublicKey) -> Result<HashedRekord, LogProofError> {
    if !entry
        .log_id
        .eq_ignore_ascii_case(&hex::encode(log_key.spki_sha256()))
    {
        return Err(LogProofError::LogIdMismatch);
    }

    let set = entry
        .verification
        .signed_entry_timestamp
        .as_deref()
        .ok_or(LogProofError::Missing("signed entry timestamp"))?;
    let set = STANDARD
        .decode(set)
        .map_err(|_| LogProofError::SignedEntryTimestamp)?;
    log_key
        .verify_message(signed_entry_timestamp_payload(entry).as_bytes(), &set)
        .map_err(|_| LogProofError::SignedEntryTimestamp)?;

    let body = STANDARD
        .decode(&entry.body)
        .map_err(|e| LogProofError::Body(e.to_string()))?;
    let leaf = leaf_hash(&body);
    if !entry
        .uuid
        .to_ascii_lowercase()
        .ends_with(&hex::encode(leaf))
    {
        return Err(LogProofError::UuidMismatch);
    }

    let proof = entry
        .verification
        .inclusion_proof
        .as_ref()
        .ok_or(LogProofError::Missing("inclusion proof"))?;
    let hashes = proof
        .hashes
        .iter()
        .map(|h| decode_hash(h, "proof hash"))
        .collect::<Result<Vec<_>, _>>()?;
    let root = decode_hash(&proof.root_hash, "root hash")?;
    let index = u64::try_from(proof.log_index)
        .map_err(|_| LogProofError::Inclusion("negative index".to_string()))?;
    let size = u64::try_from(proof.tree_size)
        .map_err(|_| LogProofError::Inclusion("negative tree size".to_string()))?;
    verify_inclusion(&leaf, index, size, &hashes, &root)?;

    let checkpoint = proof
        .checkpoint
        .as_deref()
        .ok_or(LogProofError::Missing("checkpoint"))?;
    let checkpoint = Checkpoint::verify(checkpoint, log_key)?;
    if checkpoint.size != size || checkpoint.root_hash != root {
        return Err(LogProofError::Checkpoint(
            "checkpoint does not commit to the proof root".to_string(),
        ));
    }

    HashedRekord::parse(&body)
}
