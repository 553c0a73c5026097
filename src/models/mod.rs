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

//! Domain models.
//!
//! These are the types used at the API boundary and in business logic.
//! Backend-specific row structs live in the DAL and convert to/from these
//! at the DAL boundary.

pub mod artifact;
pub mod caller;
pub mod descriptor;
pub mod envelope;
pub mod job;

pub use artifact::{ArtifactMeta, RetrievalHandle};
pub use caller::{Caller, Page};
pub use descriptor::EventDescriptor;
pub use envelope::Envelope;
pub use job::{ClaimedJob, Job, JobStatus, JobSummary};
