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

//! Long-running job execution.
//!
//! The executor claims Pending jobs from the ledger's outbox, runs them
//! against the external data engine under an outer time bound, and records
//! the terminal outcome: a result artifact and Completed, or a structured
//! error detail and Failed.
//!
//! Claiming is a single-winner guarded swap, so many executor instances
//! can poll the same ledger; a job is executed by at most one attempt at a
//! time. Completion transitions are idempotent at the ledger, tolerating
//! at-least-once redelivery of completion signals.

pub mod engine;
pub mod sweeper;

pub use engine::{QueryEngine, QueryOutput};
pub use sweeper::StaleSweeper;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::dal::DAL;
use crate::dispatcher::WorkSignal;
use crate::error::{EngineError, ExecutorError, LedgerError};
use crate::models::{ClaimedJob, JobStatus};
use crate::storage::ResultStore;

/// Maximum bytes of an engine error message recorded on a job.
const MAX_ERROR_DETAIL_BYTES: usize = 512;

/// Executes claimed jobs against the external data engine.
pub struct JobExecutor {
    dal: DAL,
    engine: Arc<dyn QueryEngine>,
    result_store: Arc<dyn ResultStore>,
    signal: Arc<dyn WorkSignal>,
    config: ExecutorConfig,
    /// Unique identifier for this executor instance, for logging.
    instance_id: Uuid,
}

impl JobExecutor {
    pub fn new(
        dal: DAL,
        engine: Arc<dyn QueryEngine>,
        result_store: Arc<dyn ResultStore>,
        signal: Arc<dyn WorkSignal>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            dal,
            engine,
            result_store,
            signal,
            config,
            instance_id: Uuid::new_v4(),
        }
    }

    /// Runs the execution loop until the work signal is shut down.
    ///
    /// Each wakeup claims up to the available concurrency slots and spawns
    /// the claimed jobs; a semaphore bounds in-flight executions.
    /// Transient ledger failures are logged and retried on the next
    /// wakeup rather than tearing the loop down.
    pub async fn run(&self) -> Result<(), ExecutorError> {
        info!(instance_id = %self.instance_id, "Starting job executor");
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_jobs));

        loop {
            self.signal.wait_for_work().await;
            if self.signal.is_shutdown() {
                break;
            }

            let slots = semaphore
                .available_permits()
                .min(self.config.claim_batch_size);
            if slots == 0 {
                continue;
            }

            let claimed = match self.dal.jobs().claim_ready(slots).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    error!(error = %e, "Failed to claim jobs; will retry");
                    continue;
                }
            };

            for job in claimed {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    // The semaphore is never closed while the loop runs.
                    Err(_) => break,
                };
                let dal = self.dal.clone();
                let engine = self.engine.clone();
                let store = self.result_store.clone();
                let config = self.config.clone();
                tokio::spawn(async move {
                    Self::execute_claimed(dal, engine, store, config, job).await;
                    drop(permit);
                });
            }
        }

        info!(instance_id = %self.instance_id, "Job executor stopped");
        Ok(())
    }

    /// Claims and executes one round of jobs inline.
    ///
    /// Returns the number of jobs executed. Useful for embedding and for
    /// deterministic tests; the long-running path is [`run`](Self::run).
    pub async fn tick(&self) -> Result<usize, ExecutorError> {
        let claimed = self
            .dal
            .jobs()
            .claim_ready(self.config.claim_batch_size)
            .await?;
        let count = claimed.len();
        for job in claimed {
            Self::execute_claimed(
                self.dal.clone(),
                self.engine.clone(),
                self.result_store.clone(),
                self.config.clone(),
                job,
            )
            .await;
        }
        Ok(count)
    }

    /// Runs one claimed job to its terminal state.
    ///
    /// Every outcome lands a terminal transition; transition races (e.g.
    /// against the staleness sweep) are benign no-ops.
    async fn execute_claimed(
        dal: DAL,
        engine: Arc<dyn QueryEngine>,
        store: Arc<dyn ResultStore>,
        config: ExecutorConfig,
        job: ClaimedJob,
    ) {
        let job_id = job.id;
        info!(job_id = %job_id, owner = %job.owner, "Executing job");

        let outcome = tokio::time::timeout(config.job_timeout, engine.run(&job.payload)).await;

        let (status, result_key, error) = match outcome {
            Ok(Ok(output)) => {
                info!(job_id = %job_id, rows = ?output.rows, "Engine execution succeeded");
                match store.put(job_id, &output.bytes).await {
                    Ok(meta) => (JobStatus::Completed, Some(meta.key), None),
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "Failed to store result artifact");
                        (
                            JobStatus::Failed,
                            None,
                            Some((
                                "result_store".to_string(),
                                EngineError::new("result_store", e.to_string())
                                    .truncated_message(MAX_ERROR_DETAIL_BYTES),
                            )),
                        )
                    }
                }
            }
            Ok(Err(engine_err)) => {
                warn!(job_id = %job_id, class = %engine_err.class, "Engine execution failed");
                (
                    JobStatus::Failed,
                    None,
                    Some((
                        engine_err.class.clone(),
                        engine_err.truncated_message(MAX_ERROR_DETAIL_BYTES),
                    )),
                )
            }
            Err(_) => {
                warn!(
                    job_id = %job_id,
                    timeout_secs = config.job_timeout.as_secs(),
                    "Job exceeded the execution bound"
                );
                (
                    JobStatus::Failed,
                    None,
                    Some((
                        "timeout".to_string(),
                        format!(
                            "execution exceeded the {}s bound",
                            config.job_timeout.as_secs()
                        ),
                    )),
                )
            }
        };

        match dal.jobs().transition(job_id, status, result_key, error).await {
            Ok(_) => {}
            Err(LedgerError::InvalidTransition { from, to }) => {
                // Lost a race, e.g. the staleness sweep already failed the
                // job. Nothing further to do.
                warn!(job_id = %job_id, ?from, ?to, "Terminal transition was a no-op");
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to record job outcome");
            }
        }
    }
}
