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

//! # Sluice
//!
//! A Rust library for durable async job orchestration and filtered batch
//! ingestion.
//!
//! Sluice provides two cooperating cores that share a common design
//! vocabulary (durable job state, at-least-once delivery, idempotent batch
//! application):
//!
//! - **Job orchestration**: callers submit long-running queries and receive
//!   a job handle immediately. Jobs are tracked in a durable ledger with
//!   monotonic status transitions (`Pending` → `Running` →
//!   `Completed`/`Failed`), executed out-of-band against a pluggable
//!   [`QueryEngine`], and their results are written to a [`ResultStore`]
//!   that hands out time-bounded retrieval handles.
//! - **Batch ingestion**: arriving event descriptors are filtered by a
//!   metadata-only admission policy, buffered on a durable channel with
//!   visibility timeouts and dead-lettering, and applied to the persistent
//!   store in bounded batches with per-item failure isolation and a single
//!   atomic commit per batch.
//!
//! # Architecture
//!
//! All shared state lives in the database; worker instances are stateless
//! and synchronize only through it. The job ledger's guarded
//! compare-and-swap transitions, the channel's visibility-timeout
//! exclusivity, and the store's transaction isolation are the only
//! synchronization points, so many dispatcher, executor, and applier
//! instances can run concurrently without in-process coordination.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sluice::{Database, DAL, FilesystemResultStore, QueryDispatcher, Caller};
//!
//! let database = Database::new("sluice.db", "", 1);
//! database.run_migrations().await?;
//! let dal = DAL::new(database);
//! let store = Arc::new(FilesystemResultStore::new("./results")?);
//!
//! let dispatcher = QueryDispatcher::new(dal.clone(), store);
//! let job_id = dispatcher
//!     .submit(&Caller::user("u1"), serde_json::json!({"query": "SELECT 1"}))
//!     .await?;
//! ```

pub mod config;
pub mod dal;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod ingest;
pub mod models;
pub mod storage;

pub use config::{ExecutorConfig, IngestConfig};
pub use dal::DAL;
pub use database::Database;
pub use dispatcher::{JobStatusView, QueryDispatcher};
pub use error::{
    ApplyError, ArtifactError, ChannelError, EngineError, ExecutorError, LedgerError, RecordError,
    SubmitError,
};
pub use executor::{JobExecutor, QueryEngine, QueryOutput, StaleSweeper};
pub use ingest::{admit, BatchApplier, FilterRule, FilterSet, IngestGate, PayloadFetcher};
pub use models::{
    ArtifactMeta, Caller, Envelope, EventDescriptor, Job, JobStatus, JobSummary, Page,
    RetrievalHandle,
};
pub use storage::{FilesystemResultStore, ResultStore};
