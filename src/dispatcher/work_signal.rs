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

//! Work notification abstraction for the executor loop.
//!
//! The dispatcher's handoff to the executor is an outbox row, not a
//! return channel; this trait abstracts how an executor waits for new
//! outbox rows to appear. The polling implementation suits a single-node
//! store with no push notification support.
//!
//! # Example
//!
//! ```rust,ignore
//! let signal = PollSignal::new();
//!
//! loop {
//!     signal.wait_for_work().await;
//!     let jobs = dal.jobs().claim_ready(10).await?;
//!     // ...
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;

/// Trait for abstracting work notification mechanisms.
///
/// Implementations provide a way to wait efficiently for work to become
/// available. The caller should attempt to claim work after
/// `wait_for_work` returns, handling the case where none is actually
/// available.
#[async_trait]
pub trait WorkSignal: Send + Sync {
    /// Waits until work might be available, or a timeout elapses.
    async fn wait_for_work(&self);

    /// Signals the waiter to stop promptly.
    fn shutdown(&self);

    /// Returns true once shutdown has been requested.
    fn is_shutdown(&self) -> bool;
}

/// Periodic-polling work signal.
pub struct PollSignal {
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl PollSignal {
    /// Default poll interval.
    const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

    /// Creates a work signal with the default poll interval (500ms).
    pub fn new() -> Self {
        Self::with_poll_interval(Self::DEFAULT_POLL_INTERVAL)
    }

    /// Creates a work signal with a custom poll interval.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }
}

impl Default for PollSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkSignal for PollSignal {
    async fn wait_for_work(&self) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => {
                debug!("Poll interval elapsed");
            }
            _ = self.notify.notified() => {
                debug!("Work signal shutdown received");
            }
        }
    }

    fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
