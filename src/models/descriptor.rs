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

//! Ingestion event descriptors.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deriving natural keys from descriptor fields.
const NATURAL_KEY_NAMESPACE: Uuid = Uuid::from_bytes([
    0x5b, 0x1c, 0x2e, 0x4f, 0x9a, 0x3d, 0x4c, 0x8e, 0xb2, 0x6f, 0x1d, 0x7a, 0x5c, 0x3e, 0x9b,
    0x0d,
]);

/// An immutable fact about one externally observed arrival, e.g. a file
/// landing in a location.
///
/// Filtering policy is applied to a descriptor without ever inspecting its
/// payload body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    /// Hierarchical source location (path + name).
    pub location: String,
    /// Payload size in bytes, as reported by the notifier.
    pub size: i64,
    /// When the arrival was observed.
    pub arrived_at: DateTime<Utc>,
    /// Content-type hint from the notifier; advisory only.
    pub content_type_hint: String,
}

impl EventDescriptor {
    pub fn new(
        location: impl Into<String>,
        size: i64,
        arrived_at: DateTime<Utc>,
        content_type_hint: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            size,
            arrived_at,
            content_type_hint: content_type_hint.into(),
        }
    }

    /// Derives the stable natural key for this descriptor.
    ///
    /// Built from immutable descriptor fields (location + arrival
    /// timestamp), so redelivery of the same arrival always produces the
    /// same key and reapplication is an upsert onto the same row.
    ///
    /// The timestamp is normalized to microsecond precision, matching what
    /// the store persists, so the key survives a database round trip.
    pub fn natural_key(&self) -> Uuid {
        let seed = format!(
            "{}|{}",
            self.location,
            self.arrived_at.to_rfc3339_opts(SecondsFormat::Micros, true)
        );
        Uuid::new_v5(&NATURAL_KEY_NAMESPACE, seed.as_bytes())
    }
}
