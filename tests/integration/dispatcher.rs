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

//! Integration tests for the caller-facing query dispatcher.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use sluice::error::{LedgerError, SubmitError};
use sluice::models::{Caller, JobStatus, Page};
use sluice::storage::{FilesystemResultStore, ResultStore};
use sluice::QueryDispatcher;

use crate::fixtures::TestFixture;

fn store_in(dir: &tempfile::TempDir) -> Arc<FilesystemResultStore> {
    Arc::new(FilesystemResultStore::new(dir.path()).expect("Failed to create result store"))
}

#[tokio::test]
async fn test_submit_returns_pending_job_immediately() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let dispatcher = QueryDispatcher::new(dal.clone(), store_in(&dir));

    let caller = Caller::user("u1");
    let job_id = dispatcher
        .submit(&caller, json!({"query": "SELECT * FROM metrics"}))
        .await
        .expect("Submit failed");

    // Submission is synchronous and cheap: the job exists, is Pending, and
    // carries neither result nor error yet.
    let view = dispatcher.status(job_id, &caller).await.expect("Status failed");
    assert_eq!(view.job_id, job_id);
    assert_eq!(view.status, JobStatus::Pending);
    assert!(view.result.is_none());
    assert!(view.error.is_none());
}

#[tokio::test]
async fn test_rejected_submission_creates_no_job() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let dispatcher = QueryDispatcher::new(dal.clone(), store_in(&dir));

    let caller = Caller::user("u1");
    match dispatcher.submit(&caller, json!({"query": ""})).await {
        Err(SubmitError::InvalidPayload(_)) => {}
        other => panic!("Expected InvalidPayload, got {:?}", other),
    }

    // Validation happens before any durable state is written.
    let jobs = dispatcher
        .list(&caller, Page::default())
        .await
        .expect("List failed");
    assert!(jobs.is_empty());
    assert!(dal.jobs().claim_ready(10).await.expect("Claim failed").is_empty());
}

#[tokio::test]
async fn test_status_enforces_ownership() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let dispatcher = QueryDispatcher::new(dal.clone(), store_in(&dir));

    let owner = Caller::user("u1");
    let job_id = dispatcher
        .submit(&owner, json!({"query": "SELECT 1"}))
        .await
        .expect("Submit failed");

    match dispatcher.status(job_id, &Caller::user("u2")).await {
        Err(LedgerError::Forbidden(id)) => assert_eq!(id, job_id),
        other => panic!("Expected Forbidden, got {:?}", other.map(|v| v.status)),
    }

    let view = dispatcher
        .status(job_id, &Caller::admin("ops"))
        .await
        .expect("Admin status failed");
    assert_eq!(view.status, JobStatus::Pending);
}

#[tokio::test]
async fn test_completed_status_mints_redeemable_handle() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = store_in(&dir);
    let dispatcher =
        QueryDispatcher::new(dal.clone(), store.clone()).with_handle_ttl(Duration::from_secs(60));

    let caller = Caller::user("u1");
    let job_id = dispatcher
        .submit(&caller, json!({"query": "SELECT 1"}))
        .await
        .expect("Submit failed");

    // Drive the job to completion the way an executor would.
    dal.jobs()
        .transition(job_id, JobStatus::Running, None, None)
        .await
        .expect("Start failed");
    let meta = store
        .put(job_id, b"col\n1\n")
        .await
        .expect("Artifact write failed");
    dal.jobs()
        .transition(job_id, JobStatus::Completed, Some(meta.key.clone()), None)
        .await
        .expect("Completion failed");

    let view = dispatcher.status(job_id, &caller).await.expect("Status failed");
    assert_eq!(view.status, JobStatus::Completed);
    let handle = view.result.expect("Completed status should carry a handle");

    let bytes = store
        .redeem(&handle, &caller)
        .await
        .expect("Redeem failed");
    assert_eq!(bytes, b"col\n1\n");

    // A handle minted for the owner cannot be redeemed by someone else.
    match store.redeem(&handle, &Caller::user("u2")).await {
        Err(sluice::error::ArtifactError::Forbidden(_)) => {}
        other => panic!("Expected Forbidden, got {:?}", other.map(|b| b.len())),
    }
}

#[tokio::test]
async fn test_failed_status_carries_error_detail() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let dispatcher = QueryDispatcher::new(dal.clone(), store_in(&dir));

    let caller = Caller::user("u1");
    let job_id = dispatcher
        .submit(&caller, json!({"query": "SELECT 1"}))
        .await
        .expect("Submit failed");
    dal.jobs()
        .transition(job_id, JobStatus::Running, None, None)
        .await
        .expect("Start failed");
    dal.jobs()
        .transition(
            job_id,
            JobStatus::Failed,
            None,
            Some(("syntax".into(), "unexpected token".into())),
        )
        .await
        .expect("Failure transition failed");

    let view = dispatcher.status(job_id, &caller).await.expect("Status failed");
    assert_eq!(view.status, JobStatus::Failed);
    assert!(view.result.is_none());
    let error = view.error.expect("Failed status should carry error detail");
    assert_eq!(error.class, "syntax");
    assert_eq!(error.message, "unexpected token");
}
