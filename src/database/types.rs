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

//! Conversions between domain types and SQLite storage types.
//!
//! Storage conventions: UUIDs are stored as BLOB (`Vec<u8>`), timestamps as
//! RFC3339 TEXT with a fixed UTC offset. The fixed offset keeps the TEXT
//! representation lexicographically ordered, which the DAL relies on for
//! `visible_at` / `updated_at` comparisons in SQL.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Converts a UUID to its BLOB storage form.
pub fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

/// Reads a UUID back from its BLOB storage form.
pub fn blob_to_uuid(bytes: &[u8]) -> Result<Uuid, uuid::Error> {
    Uuid::from_slice(bytes)
}

/// Converts a timestamp to its TEXT storage form.
pub fn ts_to_text(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Reads a timestamp back from its TEXT storage form.
pub fn text_to_ts(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// The current time in TEXT storage form.
pub fn now_text() -> String {
    ts_to_text(Utc::now())
}
