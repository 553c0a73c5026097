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

//! Error types for sluice.
//!
//! Each seam of the system has its own error enum. Infrastructure-transient
//! failures (`ConnectionPool`, `Storage`) are surfaced to the caller for
//! retry with backoff; semantic failures (`InvalidPayload`,
//! `ValidationFailed`) are recorded and surfaced to the owning caller,
//! never silently discarded.

use thiserror::Error;
use uuid::Uuid;

use crate::models::JobStatus;

/// Errors from the job ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No job exists with the given ID.
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    /// The caller is not the job's owner and lacks the administrative role.
    #[error("Caller is not permitted to access job {0}")]
    Forbidden(Uuid),

    /// The requested status change is not a legal transition.
    ///
    /// This is a race guard, not a user error: a worker that loses a
    /// claim race observes it and exits as a no-op.
    #[error("Invalid job transition: {from:?} -> {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// A terminal transition was requested without its required detail:
    /// Completed must carry a result reference, Failed must carry an
    /// error class and message.
    #[error("Transition to {0:?} is missing its outcome detail")]
    MissingOutcomeDetail(JobStatus),

    /// Failed to obtain a connection from the pool.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// The backing store rejected or failed the operation.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<diesel::result::Error> for LedgerError {
    fn from(e: diesel::result::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

/// Errors from query submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The submission failed validation. No job was created; the caller
    /// must fix the payload and resubmit.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Propagated ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A structured execution failure from the external data engine.
///
/// Carries an upstream error class and a message. The message is truncated
/// before it is recorded on the job, so raw engine internals never reach
/// callers.
#[derive(Debug, Clone, Error)]
#[error("{class}: {message}")]
pub struct EngineError {
    /// Coarse classification of the upstream failure (e.g. "syntax",
    /// "resource_exhausted").
    pub class: String,
    /// Human-readable detail.
    pub message: String,
}

impl EngineError {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Returns the message truncated to `max` bytes on a char boundary.
    pub fn truncated_message(&self, max: usize) -> String {
        if self.message.len() <= max {
            return self.message.clone();
        }
        let mut end = max;
        while !self.message.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &self.message[..end])
    }
}

/// Errors from the job executor.
///
/// Engine failures and timeouts are not errors at this level; they are
/// recorded on the job as a terminal Failed status. Only infrastructure
/// failures that prevent the loop from claiming or recording surface
/// here.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Propagated ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors from the result store.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// No artifact exists under the given key.
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// The retrieval handle's deadline has passed.
    #[error("Retrieval handle expired")]
    HandleExpired,

    /// The caller is not within the handle's scope.
    #[error("Caller is not permitted to access artifact {0}")]
    Forbidden(String),

    /// Stored bytes no longer match the recorded content hash.
    #[error("Content hash mismatch for artifact {0}")]
    Integrity(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the buffering channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Failed to obtain a connection from the pool.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// The backing store rejected or failed the operation.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<diesel::result::Error> for ChannelError {
    fn from(e: diesel::result::Error) -> Self {
        ChannelError::Storage(e.to_string())
    }
}

/// Errors from the ingested record store.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Failed to obtain a connection from the pool.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// The backing store rejected or failed the operation.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<diesel::result::Error> for RecordError {
    fn from(e: diesel::result::Error) -> Self {
        RecordError::Storage(e.to_string())
    }
}

/// Errors from batch application.
///
/// Per-item validation failures are not errors at this level; they are
/// reported in the batch's per-item outcome sequence and isolated from the
/// rest of the batch.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// Propagated channel failure.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The store rejected the batch commit. No envelope in the batch was
    /// acknowledged; all become eligible for redelivery.
    #[error("Batch commit failed: {0}")]
    CommitFailed(String),
}
