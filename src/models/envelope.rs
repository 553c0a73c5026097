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

//! Delivery envelopes on the buffering channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EventDescriptor;

/// One message on the buffering channel, wrapping an event descriptor.
///
/// A claimed envelope is invisible to other consumers until its visibility
/// deadline elapses or it is explicitly acknowledged. The delivery count
/// increments on each claim; once it exceeds the configured ceiling the
/// envelope is diverted to the dead-letter state instead of redelivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub descriptor: EventDescriptor,
    /// Number of times this envelope has been delivered, including the
    /// current delivery.
    pub delivery_count: i32,
    pub enqueued_at: DateTime<Utc>,
    /// When this envelope becomes visible to consumers again if not
    /// acknowledged.
    pub visible_at: DateTime<Utc>,
    /// Most recent per-item failure reason, if any.
    pub last_error: Option<String>,
}
