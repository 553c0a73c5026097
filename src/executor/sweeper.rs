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

//! Staleness detection for abandoned executions.
//!
//! An executor that dies mid-execution leaves its job Running with no one
//! to finish it. The sweep compares each Running job's `updated_at`
//! against the outer execution bound plus a grace period and force-fails
//! the ones that can no longer be live, so callers always end up with a
//! definitive terminal status instead of an indefinite in-progress one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::dal::DAL;
use crate::error::LedgerError;

/// Periodically fails Running jobs that have outlived the execution bound.
pub struct StaleSweeper {
    dal: DAL,
    config: ExecutorConfig,
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StaleSweeper {
    pub fn new(dal: DAL, config: ExecutorConfig) -> Self {
        Self {
            dal,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Runs the sweep loop until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) {
        info!(
            interval_secs = self.config.stale_sweep_interval.as_secs(),
            stale_after_secs = self.config.stale_after().as_secs(),
            "Starting stale job sweeper"
        );

        while !self.shutdown.load(Ordering::SeqCst) {
            tokio::select! {
                _ = tokio::time::sleep(self.config.stale_sweep_interval) => {}
                _ = self.notify.notified() => break,
            }

            if let Err(e) = self.sweep_once().await {
                error!(error = %e, "Stale sweep failed; will retry");
            }
        }

        info!("Stale job sweeper stopped");
    }

    /// Performs one sweep. Returns the IDs of the jobs force-failed.
    pub async fn sweep_once(&self) -> Result<Vec<Uuid>, LedgerError> {
        let stale_after = chrono::Duration::from_std(self.config.stale_after())
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let cutoff = Utc::now() - stale_after;

        let swept = self.dal.jobs().fail_stale(cutoff).await?;
        for job_id in &swept {
            warn!(job_id = %job_id, "Force-failed stale Running job");
        }
        Ok(swept)
    }

    /// Signals the sweep loop to stop promptly.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}
