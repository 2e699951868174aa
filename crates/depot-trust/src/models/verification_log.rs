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

//! Append-only verification audit records.

use super::verification::VerificationStatus;
use super::{TenantId, UnknownVariant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Outcome class of a verification attempt.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogResult {
    /// Verification completed and succeeded
    Success,
    /// Verification completed and failed
    Failure,
    /// Verification could not be completed; retryable
    Incomplete,
}

impl LogResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogResult::Success => "success",
            LogResult::Failure => "failure",
            LogResult::Incomplete => "incomplete",
        }
    }
}

impl fmt::Display for LogResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogResult {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(LogResult::Success),
            "failure" => Ok(LogResult::Failure),
            "incomplete" => Ok(LogResult::Incomplete),
            other => Err(UnknownVariant::new("verification result", other)),
        }
    }
}

/// One stored verification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationLog {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub artifact_id: Uuid,
    pub signature_id: Option<Uuid>,
    /// Signature scheme that was checked
    pub verification_type: String,
    pub verification_result: LogResult,
    pub verification_status: VerificationStatus,
    pub verification_method: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub actor_id: Option<Uuid>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A verification attempt to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVerificationLog {
    pub artifact_id: Uuid,
    pub signature_id: Option<Uuid>,
    pub verification_type: String,
    pub verification_result: LogResult,
    pub verification_status: VerificationStatus,
    pub verification_method: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub actor_id: Option<Uuid>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}
