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

//! Result artifacts and retrieval handles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata for a stored result artifact.
///
/// Artifacts are immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Storage key addressing the artifact.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// SHA-256 hex digest of the content.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    /// The job this artifact belongs to.
    pub job_id: Uuid,
}

/// A time-bounded pointer to a result artifact, scoped to the identity it
/// was minted for.
///
/// Callers receive a handle, never the artifact itself; redeeming the
/// handle after `expires_at` fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalHandle {
    /// Storage key of the artifact.
    pub key: String,
    /// Identity the handle was minted for.
    pub scope: String,
    /// Opaque handle token.
    pub token: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl RetrievalHandle {
    /// Returns true if the handle is still within its validity window.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
