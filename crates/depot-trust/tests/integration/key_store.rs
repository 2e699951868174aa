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

//! Trusted key store lifecycle tests.

use crate::fixtures::*;
use chrono::{Duration, Utc};
use depot_trust::security::{
    AddPublicKeyRequest, AdminError, RevokeKeyRequest, ServiceError, UpdateKeyRequest,
};
use depot_trust::{KeySource, KeyType, StoreError, TenantId};

/// Re-adding a key refreshes it in place.
#[tokio::test]
async fn test_readding_key_keeps_identity() {
    let ctx = TestContext::new().await;
    let first = ctx.trust_key(KeyType::Pgp, ALICE_ASC).await;
    assert_eq!(first.fingerprint, ALICE_FPR);
    assert_eq!(first.key_id, "DF98B426044486D3");
    assert_eq!(first.key_source, KeySource::Imported);
    assert!(first.trusted);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let mut request = AddPublicKeyRequest::new(KeyType::Pgp, ALICE_ASC);
    request.name = Some("Alice (release)".to_string());
    let second = ctx.service.add_public_key(&ctx.actor, request).await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at >= first.updated_at);
    assert_eq!(second.name, "Alice (release)");
    assert!(!second.trusted);
    assert_eq!(ctx.service.list_public_keys(ctx.tenant).await.unwrap().len(), 1);
}

/// Only trusted, enabled, unrevoked keys inside their validity window are usable.
#[tokio::test]
async fn test_trusted_keys_exclude_unusable() {
    let ctx = TestContext::new().await;
    let alice = ctx.trust_key(KeyType::Pgp, ALICE_ASC).await;
    let bob = ctx.trust_key(KeyType::Pgp, BOB_ASC).await;
    let cosign = ctx.trust_key(KeyType::Cosign, COSIGN_PUB).await;

    let mut request = AddPublicKeyRequest::new(KeyType::Pgp, MALLORY_ASC);
    request.trusted = true;
    request.valid_until = Some(Utc::now() + Duration::seconds(1));
    let mallory = ctx.service.add_public_key(&ctx.actor, request).await.unwrap();

    let usable = ctx.service.get_trusted_keys(ctx.tenant, None).await.unwrap();
    assert_eq!(usable.len(), 4);

    ctx.service
        .revoke_public_key(&ctx.actor, alice.id, RevokeKeyRequest::default())
        .await
        .unwrap();
    ctx.service
        .set_key_enabled(&ctx.actor, bob.id, false)
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let usable = ctx.service.get_trusted_keys(ctx.tenant, None).await.unwrap();
    let ids: Vec<_> = usable.iter().map(|k| k.id).collect();
    assert_eq!(ids, vec![cosign.id]);

    // Listing still shows every key with its state.
    let all = ctx.service.list_public_keys(ctx.tenant).await.unwrap();
    assert_eq!(all.len(), 4);
    let revoked = all.iter().find(|k| k.id == alice.id).unwrap();
    assert!(revoked.revoked);
    assert!(all.iter().any(|k| k.id == mallory.id));
}

/// Revocation is permanent; enabling the key again does not restore trust.
#[tokio::test]
async fn test_revoked_key_stays_unusable() {
    let ctx = TestContext::new().await;
    let key = ctx.trust_key(KeyType::Pgp, ALICE_ASC).await;

    ctx.service
        .revoke_public_key(&ctx.actor, key.id, RevokeKeyRequest::default())
        .await
        .unwrap();
    let updated = ctx
        .service
        .update_public_key(
            &ctx.actor,
            key.id,
            UpdateKeyRequest {
                trusted: Some(true),
                enabled: Some(true),
            },
        )
        .await
        .unwrap();

    assert!(updated.revoked);
    assert!(updated.trusted);
    assert!(updated.enabled);
    assert!(ctx
        .service
        .get_trusted_keys(ctx.tenant, None)
        .await
        .unwrap()
        .is_empty());
}

/// Repository keys are visible to their repository only; tenant-wide keys to all.
#[tokio::test]
async fn test_repository_scoping() {
    let ctx = TestContext::new().await;
    ctx.trust_key(KeyType::Pgp, ALICE_ASC).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let mut request = AddPublicKeyRequest::new(KeyType::Pgp, BOB_ASC);
    request.trusted = true;
    request.repository_id = Some(ctx.repository_id);
    ctx.service.add_public_key(&ctx.actor, request).await.unwrap();

    let tenant_wide = ctx.service.get_trusted_keys(ctx.tenant, None).await.unwrap();
    assert_eq!(tenant_wide.len(), 1);
    assert_eq!(tenant_wide[0].fingerprint, ALICE_FPR);

    let scoped = ctx
        .service
        .get_trusted_keys(ctx.tenant, Some(ctx.repository_id))
        .await
        .unwrap();
    assert_eq!(scoped.len(), 2);
    assert_eq!(scoped[0].fingerprint, BOB_FPR);

    let elsewhere = ctx
        .service
        .get_trusted_keys(ctx.tenant, Some(uuid::Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(elsewhere.len(), 1);
}

/// Keys of one tenant cannot be read or changed by another.
#[tokio::test]
async fn test_keys_are_tenant_scoped() {
    let ctx = TestContext::new().await;
    let key = ctx.trust_key(KeyType::Pgp, ALICE_ASC).await;

    let other = TenantId::new_v4();
    assert!(matches!(
        ctx.service.get_public_key(other, key.id).await,
        Err(ServiceError::Store(StoreError::NotFound))
    ));
    assert!(ctx.service.list_public_keys(other).await.unwrap().is_empty());

    let intruder = depot_trust::ActorContext::system(other);
    let result = ctx
        .service
        .revoke_public_key(&intruder, key.id, RevokeKeyRequest::default())
        .await;
    assert!(matches!(
        result,
        Err(ServiceError::Store(StoreError::NotFound))
    ));
    let unchanged = ctx.service.get_public_key(ctx.tenant, key.id).await.unwrap();
    assert!(!unchanged.revoked);
}

/// Material that is not a key is refused without storing anything.
#[tokio::test]
async fn test_rejects_malformed_key_material() {
    let ctx = TestContext::new().await;

    let result = ctx
        .service
        .add_public_key(
            &ctx.actor,
            AddPublicKeyRequest::new(KeyType::Pgp, "not a key"),
        )
        .await;
    assert!(matches!(result, Err(ServiceError::Admin(AdminError::Pgp(_)))));

    let result = ctx
        .service
        .add_public_key(
            &ctx.actor,
            AddPublicKeyRequest::new(
                KeyType::Cosign,
                "-----BEGIN PUBLIC KEY-----\n-----END PUBLIC KEY-----\n",
            ),
        )
        .await;
    assert!(matches!(result, Err(ServiceError::Admin(_))));

    assert!(ctx.service.list_public_keys(ctx.tenant).await.unwrap().is_empty());
}
