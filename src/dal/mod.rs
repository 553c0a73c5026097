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

//! Data Access Layer.
//!
//! All durable state lives behind this layer: the job ledger, the
//! buffering channel, and the ingestion upsert target. Worker instances
//! share no in-process state; the guarded transitions and transactional
//! claims implemented here are the only synchronization points.
//!
//! # Example
//!
//! ```rust,ignore
//! use sluice::{Database, DAL};
//!
//! let db = Database::new(":memory:", "", 1);
//! let dal = DAL::new(db);
//!
//! let job_id = dal.jobs().create("u1", payload).await?;
//! ```

pub mod channel;
pub mod job;
pub mod models;
pub mod record;

pub use channel::ChannelDAL;
pub use job::{JobDAL, TransitionOutcome};
pub use record::{IngestedRecord, RecordDAL, StagedRecord};

use crate::database::Database;

/// Facade over the per-entity DAL implementations.
#[derive(Clone, Debug)]
pub struct DAL {
    pub(crate) database: Database,
}

impl DAL {
    /// Creates a new DAL backed by the given database.
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Job ledger operations.
    pub fn jobs(&self) -> JobDAL<'_> {
        JobDAL { dal: self }
    }

    /// Buffering channel operations.
    pub fn channel(&self) -> ChannelDAL<'_> {
        ChannelDAL { dal: self }
    }

    /// Ingested record operations.
    pub fn records(&self) -> RecordDAL<'_> {
        RecordDAL { dal: self }
    }
}
