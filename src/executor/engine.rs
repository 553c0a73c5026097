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

//! Seam to the external data engine.

use async_trait::async_trait;

use crate::error::EngineError;

/// Output of a successful query execution.
#[derive(Debug, Clone)]
pub struct QueryOutput {
    /// The serialized result payload, written to the result store as-is.
    pub bytes: Vec<u8>,
    /// Number of result rows, when the engine reports one.
    pub rows: Option<u64>,
}

/// The external data engine that executes submitted queries.
///
/// Executions run for seconds to tens of minutes; the executor imposes the
/// outer time bound, so implementations do not need their own timeout.
/// Failures should be reported with a meaningful error class; the message
/// is truncated before it is recorded on the job.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn run(&self, payload: &serde_json::Value) -> Result<QueryOutput, EngineError>;
}
