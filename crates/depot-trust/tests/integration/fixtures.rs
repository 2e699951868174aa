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

//! Shared setup for the integration tests.
//!
//! Every [`TestContext`] owns a fresh SQLite database in a temporary
//! directory, so tests never observe each other's rows.

#![allow(dead_code)]

use depot_trust::crypto::{CertificatePool, SpkiPublicKey};
use depot_trust::models::{CosignPayload, PgpPayload};
use depot_trust::security::{AddPublicKeyRequest, SignatureService, StaticLog, TransparencyLog};
use depot_trust::{
    ActorContext, ArtifactSignature, Database, KeyType, NewArtifactSignature, PublicKey,
    SignatureFormat, SignaturePayload, TenantId, DAL,
};
use once_cell::sync::Lazy;
use std::sync::{Arc, Once};
use tempfile::TempDir;
use tracing::info;
use uuid::Uuid;

pub const ARTIFACT: &[u8] = include_bytes!("../fixtures/artifact.bin");

pub const ALICE_ASC: &str = include_str!("../fixtures/pgp/alice.asc");
pub const BOB_ASC: &str = include_str!("../fixtures/pgp/bob.asc");
pub const MALLORY_ASC: &str = include_str!("../fixtures/pgp/mallory.asc");
pub const ALICE_SIG: &[u8] = include_bytes!("../fixtures/pgp/artifact.alice.sig");
pub const ALICE_SIG_ASC: &[u8] = include_bytes!("../fixtures/pgp/artifact.alice.asc");
pub const BOB_SIG: &[u8] = include_bytes!("../fixtures/pgp/artifact.bob.sig");
pub const MALLORY_SIG: &[u8] = include_bytes!("../fixtures/pgp/artifact.mallory.sig");
pub const CAROL_ASC: &str = include_str!("../fixtures/pgp/carol.asc");
pub const CAROL_SHA1_SIG: &[u8] = include_bytes!("../fixtures/pgp/artifact.carol.sha1.sig");
pub const ALICE_MALLORY_BUNDLE_ASC: &str =
    include_str!("../fixtures/pgp/alice_mallory_bundle.asc");
pub const ALICE_UNBOUND_SUBKEY_ASC: &str =
    include_str!("../fixtures/pgp/alice_unbound_subkey.asc");
pub const ALICE_FPR: &str = "74F8F7F4AAD4C94E015E114BDF98B426044486D3";
pub const BOB_FPR: &str = "8FE13E76E2C4B6BC8CEEAD775D9D72EC4AE8BA3D";

pub const COSIGN_SIG: &[u8] = include_bytes!("../fixtures/cosign/artifact.sig");
pub const COSIGN_KEYED_SIG: &[u8] = include_bytes!("../fixtures/cosign/artifact.keyed.sig");
pub const COSIGN_PUB: &str = include_str!("../fixtures/cosign/cosign.pub");
pub const FULCIO_ROOT: &str = include_str!("../fixtures/cosign/fulcio_root.pem");
pub const REKOR_PUB: &str = include_str!("../fixtures/cosign/rekor.pub");
pub const LEAF_VALID: &str = include_str!("../fixtures/cosign/leaf_valid.pem");
pub const LEAF_UNTRUSTED: &str = include_str!("../fixtures/cosign/leaf_untrusted.pem");
pub const LEAF_SERVER_AUTH: &str = include_str!("../fixtures/cosign/leaf_server_auth.pem");
const REKOR_ENTRY: &str = include_str!("../fixtures/cosign/rekor_entry.json");
const REKOR_UUID: &str = include_str!("../fixtures/cosign/rekor_uuid.txt");

/// Log index recorded in the fixture entry.
pub const REKOR_LOG_INDEX: i64 = 2;

/// The fixture log entry exactly as the log server returns it.
pub static REKOR_RESPONSE: Lazy<serde_json::Value> =
    Lazy::new(|| serde_json::from_str(REKOR_ENTRY).expect("fixture entry is valid JSON"));

static INIT: Once = Once::new();

pub fn rekor_uuid() -> &'static str {
    REKOR_UUID.trim()
}

/// A log that serves the fixture entry with a valid inclusion proof.
pub fn proven_log() -> StaticLog {
    StaticLog::new().with_response(rekor_uuid(), REKOR_RESPONSE.clone())
}

/// A log that serves the fixture entry with one proof hash altered.
pub fn tampered_log() -> StaticLog {
    let mut response = REKOR_RESPONSE.clone();
    response[rekor_uuid()]["verification"]["inclusionProof"]["hashes"][0] =
        serde_json::Value::String("00".repeat(32));
    StaticLog::new().with_response(rekor_uuid(), response)
}

/// A fresh database, DAL and service for one test.
pub struct TestContext {
    _dir: TempDir,
    pub dal: DAL,
    pub service: SignatureService,
    pub tenant: TenantId,
    pub actor: ActorContext,
    pub repository_id: Uuid,
}

impl TestContext {
    /// A context whose transparency log proves the fixture entry.
    pub async fn new() -> Self {
        Self::with_log(proven_log()).await
    }

    pub async fn with_log(log: impl TransparencyLog + 'static) -> Self {
        INIT.call_once(|| {
            depot_trust::init_logging(None);
        });

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("trust.db");
        let database = Database::new(&path.to_string_lossy(), 1).expect("Failed to open database");
        database
            .run_migrations()
            .await
            .expect("Failed to run migrations");
        let dal = DAL::new(database);

        let tenant = TenantId::new_v4();
        let actor = ActorContext::new(tenant, Uuid::new_v4())
            .with_client_ip("192.0.2.10")
            .with_user_agent("depot-trust-tests");

        info!(tenant = %tenant, "Test context created");

        TestContext {
            _dir: dir,
            service: service_for(dal.clone(), log),
            dal,
            tenant,
            actor,
            repository_id: Uuid::new_v4(),
        }
    }

    /// Another service over the same database with a different log.
    pub fn service_with_log(&self, log: impl TransparencyLog + 'static) -> SignatureService {
        service_for(self.dal.clone(), log)
    }

    /// Adds a trusted tenant-wide key from its armored or PEM material.
    pub async fn trust_key(&self, key_type: KeyType, material: &str) -> PublicKey {
        let mut request = AddPublicKeyRequest::new(key_type, material);
        request.trusted = true;
        self.service
            .add_public_key(&self.actor, request)
            .await
            .expect("Failed to add key")
    }

    /// Stores a detached PGP signature over [`ARTIFACT`].
    pub async fn store_pgp(&self, format: SignatureFormat, data: &[u8]) -> ArtifactSignature {
        self.store_pgp_in(self.repository_id, Uuid::new_v4(), format, data)
            .await
    }

    pub async fn store_pgp_in(
        &self,
        repository_id: Uuid,
        artifact_id: Uuid,
        format: SignatureFormat,
        data: &[u8],
    ) -> ArtifactSignature {
        let signature = NewArtifactSignature::new(
            artifact_id,
            repository_id,
            format,
            data.to_vec(),
            "pgp",
            SignaturePayload::Pgp(PgpPayload::default()),
        );
        self.service
            .store_signature(&self.actor, signature)
            .await
            .expect("Failed to store signature")
    }

    /// Stores a keyless cosign signature with the given signing certificate.
    pub async fn store_keyless(&self, certificate: &str) -> ArtifactSignature {
        let payload = CosignPayload {
            certificate: Some(certificate.to_string()),
            rekor_log_uuid: Some(rekor_uuid().to_string()),
            rekor_log_index: Some(REKOR_LOG_INDEX),
            ..Default::default()
        };
        let signature = NewArtifactSignature::new(
            Uuid::new_v4(),
            self.repository_id,
            SignatureFormat::Binary,
            COSIGN_SIG.to_vec(),
            "ecdsa-p256-sha256",
            SignaturePayload::Cosign(payload),
        );
        self.service
            .store_signature(&self.actor, signature)
            .await
            .expect("Failed to store signature")
    }

    /// Stores a key-based cosign signature carrying its public key.
    pub async fn store_keyed(&self) -> ArtifactSignature {
        let mut signature = NewArtifactSignature::new(
            Uuid::new_v4(),
            self.repository_id,
            SignatureFormat::Binary,
            COSIGN_KEYED_SIG.to_vec(),
            "ecdsa-p256-sha256",
            SignaturePayload::Cosign(CosignPayload::default()),
        );
        signature.public_key = Some(COSIGN_PUB.to_string());
        self.service
            .store_signature(&self.actor, signature)
            .await
            .expect("Failed to store signature")
    }
}

fn service_for(dal: DAL, log: impl TransparencyLog + 'static) -> SignatureService {
    SignatureService::new(
        dal,
        Arc::new(log),
        CertificatePool::from_pem_bundle(FULCIO_ROOT).expect("fixture root parses"),
        Some(SpkiPublicKey::from_pem(REKOR_PUB).expect("fixture log key parses")),
    )
}
