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

//! Result artifact storage.
//!
//! Completed jobs write their output here as immutable, key-addressed
//! artifacts. Callers never receive an artifact directly; they receive a
//! time-bounded [`RetrievalHandle`] scoped to their identity and redeem it
//! while it is still valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ArtifactError;
use crate::models::{ArtifactMeta, Caller, RetrievalHandle};

/// Key-addressed storage for result artifacts.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Writes an artifact for a completed job and returns its metadata.
    ///
    /// Artifacts are immutable: writing twice under the same job is an
    /// error.
    async fn put(&self, job_id: Uuid, bytes: &[u8]) -> Result<ArtifactMeta, ArtifactError>;

    /// Fetches the metadata for a stored artifact.
    async fn meta(&self, key: &str) -> Result<ArtifactMeta, ArtifactError>;

    /// Mints a time-bounded retrieval handle scoped to `caller`.
    ///
    /// Ownership of the underlying job must already have been verified by
    /// the caller-facing layer.
    async fn open_handle(
        &self,
        key: &str,
        caller: &Caller,
        ttl: Duration,
    ) -> Result<RetrievalHandle, ArtifactError>;

    /// Redeems a handle for the artifact bytes.
    ///
    /// Fails with `HandleExpired` past the handle's deadline, `Forbidden`
    /// if `caller` is outside the handle's scope, and `Integrity` if the
    /// stored bytes no longer match the recorded content hash.
    async fn redeem(
        &self,
        handle: &RetrievalHandle,
        caller: &Caller,
    ) -> Result<Vec<u8>, ArtifactError>;
}

/// Filesystem-backed result store.
///
/// Each artifact is a pair of files under the root directory: the payload
/// (`{key}.bin`) and its metadata (`{key}.meta.json`).
pub struct FilesystemResultStore {
    root: PathBuf,
}

impl FilesystemResultStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        info!(root = %root.display(), "Filesystem result store initialized");
        Ok(Self { root })
    }

    fn payload_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.bin", key))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.meta.json", key))
    }

    fn hash_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl ResultStore for FilesystemResultStore {
    async fn put(&self, job_id: Uuid, bytes: &[u8]) -> Result<ArtifactMeta, ArtifactError> {
        let key = job_id.to_string();
        let meta = ArtifactMeta {
            key: key.clone(),
            size: bytes.len() as u64,
            content_hash: Self::hash_hex(bytes),
            created_at: Utc::now(),
            job_id,
        };

        // create_new enforces immutability: a second write under the same
        // key fails instead of overwriting.
        let payload_path = self.payload_path(&key);
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        let mut file = options.open(&payload_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        let meta_json = serde_json::to_vec(&meta)
            .map_err(|e| ArtifactError::Io(std::io::Error::other(e)))?;
        tokio::fs::write(self.meta_path(&key), meta_json).await?;

        debug!(key = %key, size = meta.size, "Stored result artifact");
        Ok(meta)
    }

    async fn meta(&self, key: &str) -> Result<ArtifactMeta, ArtifactError> {
        let bytes = match tokio::fs::read(self.meta_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Io(std::io::Error::other(e)))
    }

    async fn open_handle(
        &self,
        key: &str,
        caller: &Caller,
        ttl: Duration,
    ) -> Result<RetrievalHandle, ArtifactError> {
        // Confirm the artifact exists before minting a pointer to it.
        let meta = self.meta(key).await?;
        Ok(RetrievalHandle {
            key: meta.key,
            scope: caller.id.clone(),
            token: Uuid::new_v4(),
            expires_at: Utc::now()
                + chrono::Duration::from_std(ttl)
                    .unwrap_or_else(|_| chrono::Duration::seconds(0)),
        })
    }

    async fn redeem(
        &self,
        handle: &RetrievalHandle,
        caller: &Caller,
    ) -> Result<Vec<u8>, ArtifactError> {
        if !handle.is_valid_at(Utc::now()) {
            return Err(ArtifactError::HandleExpired);
        }
        if !caller.can_read(&handle.scope) {
            return Err(ArtifactError::Forbidden(handle.key.clone()));
        }

        let meta = self.meta(&handle.key).await?;
        let bytes = match tokio::fs::read(self.payload_path(&handle.key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(handle.key.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        if Self::hash_hex(&bytes) != meta.content_hash {
            return Err(ArtifactError::Integrity(handle.key.clone()));
        }
        Ok(bytes)
    }
}
