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

//! Job model and lifecycle state machine.
//!
//! A job is one long-running unit of work requested by a caller. Status
//! transitions are monotonic and one-directional:
//! `Pending -> Running -> {Completed | Failed}`. Once terminal, a job
//! record is immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Created, waiting to be claimed by an executor.
    Pending,
    /// Claimed by exactly one executor attempt.
    Running,
    /// Finished successfully; a result reference is set.
    Completed,
    /// Finished with an error; a structured error detail is set.
    Failed,
}

impl JobStatus {
    /// Returns true if `next` is a legal transition from this status.
    ///
    /// The only legal transitions are `Pending -> Running`,
    /// `Running -> Completed`, and `Running -> Failed`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }

    /// Returns true if this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// The status immediately preceding this one in the lifecycle, if any.
    ///
    /// Used by the ledger to derive the expected current status for a
    /// guarded compare-and-swap.
    pub fn predecessor(&self) -> Option<JobStatus> {
        match self {
            JobStatus::Pending => None,
            JobStatus::Running => Some(JobStatus::Pending),
            JobStatus::Completed | JobStatus::Failed => Some(JobStatus::Running),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Running => "Running",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        }
    }

    /// Parses a status from its storage representation.
    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "Pending" => Some(JobStatus::Pending),
            "Running" => Some(JobStatus::Running),
            "Completed" => Some(JobStatus::Completed),
            "Failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job record from the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier, generated at creation and never reused.
    pub id: Uuid,
    /// Identity of the submitting caller; only this identity (or an
    /// administrative role) may read the result reference.
    pub owner: String,
    /// The submission payload (query text and parameters) as JSON.
    pub payload: serde_json::Value,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Result store key; set if and only if the job is Completed.
    pub result_key: Option<String>,
    /// Upstream error class; set only when Failed.
    pub error_class: Option<String>,
    /// Truncated error message; set only when Failed.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A compact job listing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A job claimed for execution. Returned by the ledger's outbox claim.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: Uuid,
    pub owner: String,
    pub payload: serde_json::Value,
}
