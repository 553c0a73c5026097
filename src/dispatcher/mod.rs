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

//! Query dispatch: the caller-facing submission and retrieval surface.
//!
//! Submission is synchronous and fast: validate the payload, create a
//! Pending job with its outbox row, and return the job ID. The outbox row
//! is the fire-and-forget signal to the executor; the dispatcher never
//! waits for execution to start or finish. Validation happens before any
//! durable state is created, so a rejected submission leaves no orphan
//! Pending job behind.

pub mod work_signal;

pub use work_signal::{PollSignal, WorkSignal};

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::dal::DAL;
use crate::error::{LedgerError, SubmitError};
use crate::models::{Caller, JobStatus, JobSummary, Page, RetrievalHandle};
use crate::storage::ResultStore;

/// Maximum accepted query text length, in bytes.
const MAX_QUERY_BYTES: usize = 256 * 1024;

/// Default validity window for minted result handles.
const DEFAULT_HANDLE_TTL: Duration = Duration::from_secs(15 * 60);

/// Caller-visible view of a job's progress.
#[derive(Debug, Clone)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub status: JobStatus,
    /// Time-bounded pointer to the result artifact; present only when the
    /// job is Completed.
    pub result: Option<RetrievalHandle>,
    /// Structured error detail; present only when the job is Failed.
    pub error: Option<JobErrorDetail>,
}

/// The recorded failure of a job, as surfaced to its owner.
#[derive(Debug, Clone)]
pub struct JobErrorDetail {
    pub class: String,
    pub message: String,
}

/// Accepts query submissions and exposes job status and results.
pub struct QueryDispatcher {
    dal: DAL,
    result_store: Arc<dyn ResultStore>,
    handle_ttl: Duration,
}

impl QueryDispatcher {
    /// Creates a dispatcher with the default result handle TTL.
    pub fn new(dal: DAL, result_store: Arc<dyn ResultStore>) -> Self {
        Self {
            dal,
            result_store,
            handle_ttl: DEFAULT_HANDLE_TTL,
        }
    }

    /// Overrides the validity window for minted result handles.
    pub fn with_handle_ttl(mut self, handle_ttl: Duration) -> Self {
        self.handle_ttl = handle_ttl;
        self
    }

    /// Submits a query for asynchronous execution.
    ///
    /// Returns the new job's ID synchronously; execution happens
    /// out-of-band. Fails with `InvalidPayload` before any job is created
    /// if the submission does not validate.
    pub async fn submit(&self, caller: &Caller, payload: Value) -> Result<Uuid, SubmitError> {
        validate_payload(&payload)?;
        let job_id = self.dal.jobs().create(&caller.id, payload).await?;
        info!(job_id = %job_id, owner = %caller.id, "Accepted query submission");
        Ok(job_id)
    }

    /// Returns the caller-visible status of a job.
    ///
    /// When the job is Completed, a fresh time-bounded retrieval handle is
    /// minted for the caller. Ownership is enforced by the ledger read:
    /// non-owners without the administrative role get `Forbidden`.
    pub async fn status(
        &self,
        job_id: Uuid,
        caller: &Caller,
    ) -> Result<JobStatusView, LedgerError> {
        let job = self.dal.jobs().get(job_id, caller).await?;

        let result = match (&job.status, &job.result_key) {
            (JobStatus::Completed, Some(key)) => Some(
                self.result_store
                    .open_handle(key, caller, self.handle_ttl)
                    .await
                    .map_err(|e| LedgerError::Storage(e.to_string()))?,
            ),
            _ => None,
        };

        let error = match (&job.status, &job.error_class) {
            (JobStatus::Failed, Some(class)) => Some(JobErrorDetail {
                class: class.clone(),
                message: job.error_message.clone().unwrap_or_default(),
            }),
            (JobStatus::Failed, None) => Some(JobErrorDetail {
                class: "unknown".to_string(),
                message: String::new(),
            }),
            _ => None,
        };

        Ok(JobStatusView {
            job_id: job.id,
            status: job.status,
            result,
            error,
        })
    }

    /// Lists the caller's own jobs, newest first.
    pub async fn list(&self, caller: &Caller, page: Page) -> Result<Vec<JobSummary>, LedgerError> {
        self.dal.jobs().list(&caller.id, page).await
    }
}

/// Validates a submission payload.
///
/// A valid payload is a JSON object with a non-empty string `query` field
/// and, optionally, a `parameters` object.
fn validate_payload(payload: &Value) -> Result<(), SubmitError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| SubmitError::InvalidPayload("payload must be a JSON object".into()))?;

    let query = obj
        .get("query")
        .ok_or_else(|| SubmitError::InvalidPayload("missing 'query' field".into()))?
        .as_str()
        .ok_or_else(|| SubmitError::InvalidPayload("'query' must be a string".into()))?;

    if query.trim().is_empty() {
        return Err(SubmitError::InvalidPayload("'query' must not be empty".into()));
    }
    if query.len() > MAX_QUERY_BYTES {
        return Err(SubmitError::InvalidPayload(format!(
            "'query' exceeds {} bytes",
            MAX_QUERY_BYTES
        )));
    }

    if let Some(params) = obj.get("parameters") {
        if !params.is_object() {
            return Err(SubmitError::InvalidPayload(
                "'parameters' must be an object".into(),
            ));
        }
    }

    Ok(())
}
