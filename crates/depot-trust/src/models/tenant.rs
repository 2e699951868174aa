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

//! Tenant identity and authenticated caller context.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a tenant. Every stored record and every query is scoped by one.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TenantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// The already-authenticated caller of a service operation.
///
/// Produced by the auth layer. The tenant id here is the only tenant id the
/// service ever acts on; request payloads never carry one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub tenant_id: TenantId,
    /// None for system-initiated work such as background re-verification
    pub actor_id: Option<Uuid>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ActorContext {
    pub fn new(tenant_id: TenantId, actor_id: Uuid) -> Self {
        Self {
            tenant_id,
            actor_id: Some(actor_id),
            client_ip: None,
            user_agent: None,
        }
    }

    /// Context for work not initiated by a user.
    pub fn system(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            actor_id: None,
            client_ip: None,
            user_agent: None,
        }
    }

    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}
