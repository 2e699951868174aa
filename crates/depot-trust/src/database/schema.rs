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

//! Diesel table definitions for the trust tables.

diesel::table! {
    artifact_signatures (id) {
        id -> Binary,
        tenant_id -> Binary,
        artifact_id -> Binary,
        repository_id -> Binary,
        signature_type -> Text,
        signature_format -> Text,
        signature_data -> Binary,
        signature_algorithm -> Text,
        signer_identity -> Nullable<Text>,
        signer_fingerprint -> Nullable<Text>,
        public_key -> Nullable<Text>,
        scheme_payload -> Text,
        verified -> Integer,
        verification_status -> Text,
        verification_method -> Nullable<Text>,
        verification_error -> Nullable<Text>,
        verified_at -> Nullable<Text>,
        verified_by -> Nullable<Binary>,
        signed_at -> Nullable<Text>,
        uploaded_at -> Text,
        expires_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    public_keys (id) {
        id -> Binary,
        tenant_id -> Binary,
        repository_id -> Nullable<Binary>,
        key_type -> Text,
        fingerprint -> Text,
        key_id -> Text,
        algorithm -> Text,
        key_size -> Nullable<Integer>,
        key_material -> Text,
        name -> Text,
        owner_name -> Nullable<Text>,
        owner_email -> Nullable<Text>,
        organization -> Nullable<Text>,
        description -> Nullable<Text>,
        key_source -> Text,
        source_url -> Nullable<Text>,
        trusted -> Integer,
        enabled -> Integer,
        revoked -> Integer,
        revoked_at -> Nullable<Text>,
        revocation_reason -> Nullable<Text>,
        valid_from -> Nullable<Text>,
        valid_until -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    repository_signature_policies (tenant_id, repository_id) {
        tenant_id -> Binary,
        repository_id -> Binary,
        signature_policy -> Text,
        verification_enabled -> Integer,
        cosign_enabled -> Integer,
        pgp_enabled -> Integer,
        sigstore_enabled -> Integer,
        allowed_signers -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    verification_logs (id) {
        id -> Binary,
        tenant_id -> Binary,
        artifact_id -> Binary,
        signature_id -> Nullable<Binary>,
        verification_type -> Text,
        verification_result -> Text,
        verification_status -> Text,
        verification_method -> Nullable<Text>,
        error_code -> Nullable<Text>,
        error_message -> Nullable<Text>,
        actor_id -> Nullable<Binary>,
        client_ip -> Nullable<Text>,
        user_agent -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    artifact_signatures,
    public_keys,
    repository_signature_policies,
    verification_logs,
);
