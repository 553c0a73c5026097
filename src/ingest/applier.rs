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

//! Batch application of admitted envelopes.
//!
//! A batch forms until either the size threshold is reached or the time
//! window elapses, whichever comes first. Application isolates failures
//! per item but commits successes atomically per batch: a malformed item
//! is failed toward the dead-letter path without blocking the rest, while
//! the validated remainder is written in one transaction and acknowledged
//! in one pass afterwards. If the commit fails, nothing is acknowledged
//! and every claimed envelope becomes eligible for redelivery, which is
//! safe because records are upserts keyed by a stable natural key.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::dal::{StagedRecord, DAL};
use crate::error::ApplyError;
use crate::models::Envelope;

/// Failure to retrieve a referenced payload from the object store.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Payload not found at {0}")]
    NotFound(String),

    #[error("Fetch failed: {0}")]
    Other(String),
}

/// Retrieves the payload a descriptor refers to.
///
/// The object store holding payload bodies is an external collaborator;
/// this trait is its seam.
#[async_trait]
pub trait PayloadFetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError>;
}

/// What closed a forming batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchTrigger {
    /// The size threshold was reached.
    SizeThreshold,
    /// The time window elapsed below the threshold.
    WindowElapsed,
}

/// An ephemeral group of envelopes claimed for one processing cycle.
///
/// Never persisted; it exists only between formation and application.
#[derive(Debug)]
pub struct Batch {
    pub envelopes: Vec<Envelope>,
    pub trigger: BatchTrigger,
}

/// Per-item outcome of one application cycle.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    /// Validated, committed, and acknowledged.
    Applied {
        envelope_id: Uuid,
        natural_key: Uuid,
    },
    /// Malformed; failed toward the dead-letter path without blocking the
    /// rest of the batch.
    ValidationFailed { envelope_id: Uuid, reason: String },
}

/// Drains bounded batches from the channel and applies them to the store.
///
/// Multiple applier instances may run concurrently; the channel's
/// visibility mechanism keeps their claims disjoint, so no instance can
/// assume it sees the whole stream.
pub struct BatchApplier {
    dal: DAL,
    fetcher: Arc<dyn PayloadFetcher>,
    config: IngestConfig,
    shutdown: Arc<AtomicBool>,
}

impl BatchApplier {
    pub fn new(dal: DAL, fetcher: Arc<dyn PayloadFetcher>, config: IngestConfig) -> Self {
        Self {
            dal,
            fetcher,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signals the processing loop to stop after the current cycle.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Runs form/apply cycles until shutdown.
    pub async fn run(&self) {
        info!(
            batch_max_size = self.config.batch_max_size,
            batch_window_secs = self.config.batch_window.as_secs(),
            "Starting batch applier"
        );

        while !self.shutdown.load(Ordering::SeqCst) {
            let batch = match self.form_batch().await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(error = %e, "Batch formation failed; will retry");
                    tokio::time::sleep(self.config.claim_poll_interval).await;
                    continue;
                }
            };

            if batch.envelopes.is_empty() {
                continue;
            }

            match self.apply(batch).await {
                Ok(outcomes) => {
                    debug!(items = outcomes.len(), "Batch cycle finished");
                }
                Err(ApplyError::CommitFailed(reason)) => {
                    // Envelopes were released; they will be re-claimed and
                    // reapplied as upserts.
                    warn!(%reason, "Batch commit failed; envelopes released for redelivery");
                }
                Err(e) => {
                    error!(error = %e, "Batch application failed");
                }
            }
        }

        info!("Batch applier stopped");
    }

    /// Claims envelopes until the size threshold is reached or the time
    /// window elapses, whichever comes first.
    pub async fn form_batch(&self) -> Result<Batch, ApplyError> {
        let deadline = Instant::now() + self.config.batch_window;
        let mut envelopes: Vec<Envelope> = Vec::new();

        loop {
            let remaining = self.config.batch_max_size - envelopes.len();
            let claimed = self
                .dal
                .channel()
                .claim(
                    remaining,
                    self.config.visibility_timeout,
                    self.config.max_deliveries,
                )
                .await?;
            envelopes.extend(claimed);

            if envelopes.len() >= self.config.batch_max_size {
                debug!(size = envelopes.len(), "Batch closed by size threshold");
                return Ok(Batch {
                    envelopes,
                    trigger: BatchTrigger::SizeThreshold,
                });
            }

            let now = Instant::now();
            if now >= deadline || self.shutdown.load(Ordering::SeqCst) {
                debug!(size = envelopes.len(), "Batch closed by window");
                return Ok(Batch {
                    envelopes,
                    trigger: BatchTrigger::WindowElapsed,
                });
            }

            let sleep_for = self.config.claim_poll_interval.min(deadline - now);
            tokio::time::sleep(sleep_for).await;
        }
    }

    /// Applies one batch: per-item validation with isolation, one
    /// transactional commit, and one acknowledgment pass.
    ///
    /// On commit failure no envelope is acknowledged; all staged envelopes
    /// are released for redelivery and the error is returned.
    pub async fn apply(&self, batch: Batch) -> Result<Vec<ItemOutcome>, ApplyError> {
        let mut outcomes = Vec::with_capacity(batch.envelopes.len());
        let mut staged: Vec<(Uuid, StagedRecord)> = Vec::new();

        for envelope in &batch.envelopes {
            match self.stage_item(envelope).await {
                Ok(record) => staged.push((envelope.id, record)),
                Err(reason) => {
                    // Isolated per-item failure: record it, push the
                    // envelope along its own redelivery path, and keep
                    // going.
                    self.dal.channel().fail(envelope.id, &reason).await?;
                    outcomes.push(ItemOutcome::ValidationFailed {
                        envelope_id: envelope.id,
                        reason,
                    });
                }
            }
        }

        if staged.is_empty() {
            return Ok(outcomes);
        }

        let staged_ids: Vec<Uuid> = staged.iter().map(|(id, _)| *id).collect();
        let records: Vec<StagedRecord> = staged.iter().map(|(_, r)| r.clone()).collect();

        match self.dal.records().upsert_batch(records).await {
            Ok(written) => {
                debug!(written, "Batch committed");
                for (envelope_id, record) in staged {
                    self.dal.channel().ack(envelope_id).await?;
                    outcomes.push(ItemOutcome::Applied {
                        envelope_id,
                        natural_key: record.natural_key,
                    });
                }
                Ok(outcomes)
            }
            Err(e) => {
                self.dal.channel().release(&staged_ids).await?;
                Err(ApplyError::CommitFailed(e.to_string()))
            }
        }
    }

    /// Fetches, validates, and transforms one envelope's payload.
    ///
    /// Returns the staged record, or a reason string on any per-item
    /// failure.
    async fn stage_item(&self, envelope: &Envelope) -> Result<StagedRecord, String> {
        let descriptor = &envelope.descriptor;

        let bytes = self
            .fetcher
            .fetch(&descriptor.location)
            .await
            .map_err(|e| format!("payload fetch failed: {}", e))?;

        let parsed: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| format!("payload is not valid JSON: {}", e))?;
        let attributes = parsed
            .as_object()
            .ok_or_else(|| "payload must be a JSON object".to_string())?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let content_hash = format!("{:x}", hasher.finalize());

        // Transform into the target schema.
        let document = serde_json::json!({
            "source": descriptor.location,
            "content_type": descriptor.content_type_hint,
            "arrived_at": descriptor.arrived_at.to_rfc3339(),
            "attributes": attributes,
        });

        Ok(StagedRecord {
            natural_key: descriptor.natural_key(),
            source_location: descriptor.location.clone(),
            document,
            content_hash,
        })
    }
}
