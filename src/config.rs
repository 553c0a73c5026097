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

//! Configuration types.
//!
//! Retry counts, visibility timeouts, batch bounds, and the dead-letter
//! threshold are explicit configuration owned by this crate, not hidden
//! platform defaults, so behavior is reproducible and testable independent
//! of any particular infrastructure.

use std::time::Duration;
use thiserror::Error;

/// Configuration validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the job executor.
///
/// # Construction
///
/// ```rust,ignore
/// let config = ExecutorConfig::builder()
///     .max_concurrent_jobs(8)
///     .job_timeout(Duration::from_secs(1800))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of jobs executing concurrently in one instance.
    pub max_concurrent_jobs: usize,
    /// How many jobs to claim per wakeup.
    pub claim_batch_size: usize,
    /// How often the executor wakes to look for work.
    pub poll_interval: Duration,
    /// Outer execution bound. A job still running past this is
    /// force-failed. This is a different timeout domain from the
    /// dispatcher's sub-second submission budget.
    pub job_timeout: Duration,
    /// How often the staleness sweep runs.
    pub stale_sweep_interval: Duration,
    /// Grace period added to `job_timeout` before a Running job with no
    /// progress is considered abandoned by a dead executor.
    pub stale_grace: Duration,
}

impl ExecutorConfig {
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::default()
    }

    /// The age at which a Running job is considered stale.
    pub fn stale_after(&self) -> Duration {
        self.job_timeout + self.stale_grace
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            claim_batch_size: 10,
            poll_interval: Duration::from_millis(500),
            job_timeout: Duration::from_secs(3600), // 1 hour
            stale_sweep_interval: Duration::from_secs(300),
            stale_grace: Duration::from_secs(300),
        }
    }
}

/// Builder for [`ExecutorConfig`].
#[derive(Debug, Default)]
pub struct ExecutorConfigBuilder {
    max_concurrent_jobs: Option<usize>,
    claim_batch_size: Option<usize>,
    poll_interval: Option<Duration>,
    job_timeout: Option<Duration>,
    stale_sweep_interval: Option<Duration>,
    stale_grace: Option<Duration>,
}

impl ExecutorConfigBuilder {
    pub fn max_concurrent_jobs(mut self, value: usize) -> Self {
        self.max_concurrent_jobs = Some(value);
        self
    }

    pub fn claim_batch_size(mut self, value: usize) -> Self {
        self.claim_batch_size = Some(value);
        self
    }

    pub fn poll_interval(mut self, value: Duration) -> Self {
        self.poll_interval = Some(value);
        self
    }

    pub fn job_timeout(mut self, value: Duration) -> Self {
        self.job_timeout = Some(value);
        self
    }

    pub fn stale_sweep_interval(mut self, value: Duration) -> Self {
        self.stale_sweep_interval = Some(value);
        self
    }

    pub fn stale_grace(mut self, value: Duration) -> Self {
        self.stale_grace = Some(value);
        self
    }

    pub fn build(self) -> Result<ExecutorConfig, ConfigError> {
        let defaults = ExecutorConfig::default();
        let config = ExecutorConfig {
            max_concurrent_jobs: self.max_concurrent_jobs.unwrap_or(defaults.max_concurrent_jobs),
            claim_batch_size: self.claim_batch_size.unwrap_or(defaults.claim_batch_size),
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            job_timeout: self.job_timeout.unwrap_or(defaults.job_timeout),
            stale_sweep_interval: self
                .stale_sweep_interval
                .unwrap_or(defaults.stale_sweep_interval),
            stale_grace: self.stale_grace.unwrap_or(defaults.stale_grace),
        };

        if config.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_jobs must be at least 1".into(),
            ));
        }
        if config.claim_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "claim_batch_size must be at least 1".into(),
            ));
        }
        if config.job_timeout.is_zero() {
            return Err(ConfigError::Invalid("job_timeout must be non-zero".into()));
        }

        Ok(config)
    }
}

/// Configuration for the ingestion path.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Batch size threshold; a forming batch closes as soon as it holds
    /// this many envelopes.
    pub batch_max_size: usize,
    /// Batch time window; a non-empty forming batch closes when this much
    /// time has elapsed even if below the size threshold.
    pub batch_window: Duration,
    /// How long a claimed envelope stays invisible to other consumers.
    pub visibility_timeout: Duration,
    /// Delivery ceiling. An envelope delivered more than this many times
    /// is diverted to the dead-letter state.
    pub max_deliveries: i32,
    /// How long to sleep between empty claim attempts while forming a
    /// batch.
    pub claim_poll_interval: Duration,
}

impl IngestConfig {
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_max_size: 100,
            batch_window: Duration::from_secs(55),
            visibility_timeout: Duration::from_secs(300),
            max_deliveries: 3,
            claim_poll_interval: Duration::from_millis(250),
        }
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    batch_max_size: Option<usize>,
    batch_window: Option<Duration>,
    visibility_timeout: Option<Duration>,
    max_deliveries: Option<i32>,
    claim_poll_interval: Option<Duration>,
}

impl IngestConfigBuilder {
    pub fn batch_max_size(mut self, value: usize) -> Self {
        self.batch_max_size = Some(value);
        self
    }

    pub fn batch_window(mut self, value: Duration) -> Self {
        self.batch_window = Some(value);
        self
    }

    pub fn visibility_timeout(mut self, value: Duration) -> Self {
        self.visibility_timeout = Some(value);
        self
    }

    pub fn max_deliveries(mut self, value: i32) -> Self {
        self.max_deliveries = Some(value);
        self
    }

    pub fn claim_poll_interval(mut self, value: Duration) -> Self {
        self.claim_poll_interval = Some(value);
        self
    }

    pub fn build(self) -> Result<IngestConfig, ConfigError> {
        let defaults = IngestConfig::default();
        let config = IngestConfig {
            batch_max_size: self.batch_max_size.unwrap_or(defaults.batch_max_size),
            batch_window: self.batch_window.unwrap_or(defaults.batch_window),
            visibility_timeout: self
                .visibility_timeout
                .unwrap_or(defaults.visibility_timeout),
            max_deliveries: self.max_deliveries.unwrap_or(defaults.max_deliveries),
            claim_poll_interval: self
                .claim_poll_interval
                .unwrap_or(defaults.claim_poll_interval),
        };

        if config.batch_max_size == 0 {
            return Err(ConfigError::Invalid(
                "batch_max_size must be at least 1".into(),
            ));
        }
        if config.max_deliveries < 1 {
            return Err(ConfigError::Invalid(
                "max_deliveries must be at least 1".into(),
            ));
        }
        if config.batch_window.is_zero() {
            return Err(ConfigError::Invalid("batch_window must be non-zero".into()));
        }
        if config.visibility_timeout < config.batch_window {
            return Err(ConfigError::Invalid(
                "visibility_timeout must cover the batch_window, or claimed \
                 envelopes could reappear mid-cycle"
                    .into(),
            ));
        }

        Ok(config)
    }
}
