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

//! Filtered batch ingestion.
//!
//! Arrivals flow through three stages: the [`IngestGate`] applies the
//! admission filter at the boundary, the buffering channel decouples
//! arrival rate from processing rate, and the [`BatchApplier`] drains
//! bounded batches and applies them transactionally.

pub mod applier;
pub mod filter;

pub use applier::{Batch, BatchApplier, BatchTrigger, FetchError, ItemOutcome, PayloadFetcher};
pub use filter::{admit, FilterRule, FilterSet};

use tracing::debug;
use uuid::Uuid;

use crate::dal::DAL;
use crate::error::ChannelError;
use crate::models::EventDescriptor;

/// The event arrival boundary.
///
/// Admission happens here, logically upstream of the channel: a descriptor
/// that does not match the filter never produces an envelope at all.
pub struct IngestGate {
    dal: DAL,
    filters: FilterSet,
}

impl IngestGate {
    pub fn new(dal: DAL, filters: FilterSet) -> Self {
        Self { dal, filters }
    }

    /// Offers an arriving descriptor for ingestion.
    ///
    /// Returns the envelope ID if the descriptor was admitted and
    /// enqueued, or `None` if it was filtered out.
    pub async fn offer(
        &self,
        descriptor: &EventDescriptor,
    ) -> Result<Option<Uuid>, ChannelError> {
        if !self.filters.admit(descriptor) {
            debug!(location = %descriptor.location, "Descriptor not admitted");
            return Ok(None);
        }
        let envelope_id = self.dal.channel().enqueue(descriptor).await?;
        Ok(Some(envelope_id))
    }
}
