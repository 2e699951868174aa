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

//! Conversions between domain values and SQLite storage values.
//!
//! UUIDs are stored as 16-byte BLOBs, timestamps as RFC 3339 UTC TEXT with a
//! fixed microsecond width so that string ordering equals time ordering, and
//! booleans as INTEGER 0/1.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Encodes a UUID as a BLOB.
pub fn uuid_to_blob(id: &Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

/// Decodes a BLOB into a UUID.
pub fn blob_to_uuid(blob: &[u8]) -> Result<Uuid, uuid::Error> {
    Uuid::from_slice(blob)
}

/// Encodes a timestamp as fixed-width RFC 3339 text, e.g. `2024-01-01T00:00:00.000000Z`.
pub fn timestamp_to_text(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decodes RFC 3339 text into a UTC timestamp.
pub fn text_to_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|dt| dt.with_timezone(&Utc))
}

/// Encodes a boolean as INTEGER.
pub fn bool_to_int(value: bool) -> i32 {
    i32::from(value)
}

/// Decodes an INTEGER into a boolean. Any non-zero value is true.
pub fn int_to_bool(value: i32) -> bool {
    value != 0
}

/// Current time truncated to the stored precision.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    // Round-trip through the storage format so in-memory values equal persisted ones.
    text_to_timestamp(&timestamp_to_text(&now)).unwrap_or(now)
}
