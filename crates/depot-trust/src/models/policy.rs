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

//! Per-repository signature policy.

use super::signature::SignatureType;
use super::{TenantId, UnknownVariant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// How strictly a repository treats signatures.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignaturePolicy {
    Disabled,
    #[default]
    Optional,
    Required,
    Strict,
}

impl SignaturePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignaturePolicy::Disabled => "disabled",
            SignaturePolicy::Optional => "optional",
            SignaturePolicy::Required => "required",
            SignaturePolicy::Strict => "strict",
        }
    }
}

impl fmt::Display for SignaturePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignaturePolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(SignaturePolicy::Disabled),
            "optional" => Ok(SignaturePolicy::Optional),
            "required" => Ok(SignaturePolicy::Required),
            "strict" => Ok(SignaturePolicy::Strict),
            other => Err(UnknownVariant::new("signature policy", other)),
        }
    }
}

/// Administrator-editable policy fields.
///
/// Unknown fields are rejected so a client cannot smuggle a tenant or
/// repository id into the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySettings {
    pub signature_policy: SignaturePolicy,
    #[serde(default = "enabled")]
    pub signature_verification_enabled: bool,
    #[serde(default = "enabled")]
    pub cosign_enabled: bool,
    #[serde(default = "enabled")]
    pub pgp_enabled: bool,
    #[serde(default = "enabled")]
    pub sigstore_enabled: bool,
    #[serde(default)]
    pub allowed_signers: Vec<String>,
}

fn enabled() -> bool {
    true
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            signature_policy: SignaturePolicy::Optional,
            signature_verification_enabled: true,
            cosign_enabled: true,
            pgp_enabled: true,
            sigstore_enabled: true,
            allowed_signers: Vec::new(),
        }
    }
}

/// The signature policy of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySignaturePolicy {
    pub tenant_id: TenantId,
    pub repository_id: Uuid,
    pub settings: PolicySettings,
    /// None while the repository runs on the implicit default policy
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RepositorySignaturePolicy {
    /// Policy in effect for a repository that has never been configured.
    pub fn default_for(tenant_id: TenantId, repository_id: Uuid) -> Self {
        Self {
            tenant_id,
            repository_id,
            settings: PolicySettings::default(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn signature_policy(&self) -> SignaturePolicy {
        self.settings.signature_policy
    }

    /// A signature must accompany every upload.
    pub fn signature_required(&self) -> bool {
        matches!(
            self.settings.signature_policy,
            SignaturePolicy::Required | SignaturePolicy::Strict
        )
    }

    /// A valid signature must exist before the artifact is served.
    pub fn verification_enforced(&self) -> bool {
        self.settings.signature_verification_enabled
            && self.settings.signature_policy != SignaturePolicy::Disabled
    }

    pub fn scheme_enabled(&self, signature_type: SignatureType) -> bool {
        match signature_type {
            SignatureType::Cosign => self.settings.cosign_enabled,
            SignatureType::Pgp => self.settings.pgp_enabled,
            SignatureType::Sigstore => self.settings.sigstore_enabled,
        }
    }

    /// An empty allow-list accepts any trusted signer.
    pub fn signer_allowed(&self, signer_identity: Option<&str>) -> bool {
        if self.settings.allowed_signers.is_empty() {
            return true;
        }
        signer_identity.is_some_and(|identity| {
            self.settings
                .allowed_signers
                .iter()
                .any(|allowed| allowed == identity)
        })
    }
}
