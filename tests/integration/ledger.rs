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

//! Integration tests for the job ledger DAL.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use uuid::Uuid;

use sluice::dal::TransitionOutcome;
use sluice::error::LedgerError;
use sluice::models::{Caller, JobStatus, Page};

use crate::fixtures::TestFixture;

#[tokio::test]
async fn test_create_and_get_enforces_ownership() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    let payload = json!({"query": "SELECT 1"});
    let job_id = dal
        .jobs()
        .create("u1", payload.clone())
        .await
        .expect("Failed to create job");

    let owner = Caller::user("u1");
    let job = dal.jobs().get(job_id, &owner).await.expect("Owner read failed");
    assert_eq!(job.id, job_id);
    assert_eq!(job.owner, "u1");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.payload, payload);
    assert!(job.result_key.is_none());
    assert!(job.error_class.is_none());

    // A different, non-administrative caller is rejected.
    let stranger = Caller::user("u2");
    match dal.jobs().get(job_id, &stranger).await {
        Err(LedgerError::Forbidden(id)) => assert_eq!(id, job_id),
        other => panic!("Expected Forbidden, got {:?}", other.map(|j| j.status)),
    }

    // The administrative role can read any job.
    let admin = Caller::admin("ops");
    let job = dal.jobs().get(job_id, &admin).await.expect("Admin read failed");
    assert_eq!(job.id, job_id);

    // Unknown IDs surface as NotFound, not Forbidden.
    match dal.jobs().get(Uuid::new_v4(), &owner).await {
        Err(LedgerError::NotFound(_)) => {}
        other => panic!("Expected NotFound, got {:?}", other.map(|j| j.status)),
    }
}

#[tokio::test]
async fn test_list_is_owner_scoped_and_newest_first() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    let mut created = Vec::new();
    for i in 0..5 {
        let id = dal
            .jobs()
            .create("u1", json!({"query": format!("SELECT {}", i)}))
            .await
            .expect("Failed to create job");
        created.push(id);
        // Microsecond timestamps need a beat between inserts to order.
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    dal.jobs()
        .create("u2", json!({"query": "SELECT 99"}))
        .await
        .expect("Failed to create job");

    let page = dal
        .jobs()
        .list("u1", Page::new(3, 0))
        .await
        .expect("List failed");
    assert_eq!(page.len(), 3);
    assert_eq!(page[0].id, created[4]);
    assert_eq!(page[1].id, created[3]);
    assert_eq!(page[2].id, created[2]);

    let rest = dal
        .jobs()
        .list("u1", Page::new(3, 3))
        .await
        .expect("List failed");
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[0].id, created[1]);
    assert_eq!(rest[1].id, created[0]);
}

#[tokio::test]
async fn test_transition_is_idempotent_on_redelivery() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    let job_id = dal
        .jobs()
        .create("u1", json!({"query": "SELECT 1"}))
        .await
        .expect("Failed to create job");

    let outcome = dal
        .jobs()
        .transition(job_id, JobStatus::Running, None, None)
        .await
        .expect("Transition failed");
    assert_eq!(outcome, TransitionOutcome::Applied);

    // Redelivered start signal: accepted, but a no-op.
    let outcome = dal
        .jobs()
        .transition(job_id, JobStatus::Running, None, None)
        .await
        .expect("Repeat transition failed");
    assert_eq!(outcome, TransitionOutcome::AlreadyApplied);

    let outcome = dal
        .jobs()
        .transition(job_id, JobStatus::Completed, Some("r1".into()), None)
        .await
        .expect("Completion failed");
    assert_eq!(outcome, TransitionOutcome::Applied);

    let admin = Caller::admin("ops");
    let before = dal.jobs().get(job_id, &admin).await.expect("Read failed");

    // Redelivered completion signal leaves the record unchanged.
    let outcome = dal
        .jobs()
        .transition(job_id, JobStatus::Completed, Some("other-key".into()), None)
        .await
        .expect("Repeat completion failed");
    assert_eq!(outcome, TransitionOutcome::AlreadyApplied);

    let after = dal.jobs().get(job_id, &admin).await.expect("Read failed");
    assert_eq!(after.result_key, before.result_key);
    assert_eq!(after.updated_at, before.updated_at);
}

#[tokio::test]
async fn test_illegal_transitions_are_rejected() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    let job_id = dal
        .jobs()
        .create("u1", json!({"query": "SELECT 1"}))
        .await
        .expect("Failed to create job");

    // Pending cannot jump straight to a terminal state.
    match dal
        .jobs()
        .transition(job_id, JobStatus::Completed, Some("r1".into()), None)
        .await
    {
        Err(LedgerError::InvalidTransition { from, to }) => {
            assert_eq!(from, JobStatus::Pending);
            assert_eq!(to, JobStatus::Completed);
        }
        other => panic!("Expected InvalidTransition, got {:?}", other),
    }

    dal.jobs()
        .transition(job_id, JobStatus::Running, None, None)
        .await
        .expect("Start failed");
    dal.jobs()
        .transition(
            job_id,
            JobStatus::Failed,
            None,
            Some(("syntax".into(), "bad query".into())),
        )
        .await
        .expect("Failure transition failed");

    // Terminal states are immutable.
    match dal
        .jobs()
        .transition(job_id, JobStatus::Running, None, None)
        .await
    {
        Err(LedgerError::InvalidTransition { from, to }) => {
            assert_eq!(from, JobStatus::Failed);
            assert_eq!(to, JobStatus::Running);
        }
        other => panic!("Expected InvalidTransition, got {:?}", other),
    }
    match dal
        .jobs()
        .transition(job_id, JobStatus::Completed, Some("r1".into()), None)
        .await
    {
        Err(LedgerError::InvalidTransition { .. }) => {}
        other => panic!("Expected InvalidTransition, got {:?}", other),
    }
}

#[tokio::test]
async fn test_terminal_transition_requires_outcome_detail() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    let job_id = dal
        .jobs()
        .create("u1", json!({"query": "SELECT 1"}))
        .await
        .expect("Failed to create job");
    dal.jobs()
        .transition(job_id, JobStatus::Running, None, None)
        .await
        .expect("Start failed");

    // Completed without a result reference is rejected before any write,
    // as is Failed without error detail.
    match dal
        .jobs()
        .transition(job_id, JobStatus::Completed, None, None)
        .await
    {
        Err(LedgerError::MissingOutcomeDetail(status)) => {
            assert_eq!(status, JobStatus::Completed);
        }
        other => panic!("Expected MissingOutcomeDetail, got {:?}", other),
    }
    match dal
        .jobs()
        .transition(job_id, JobStatus::Failed, None, None)
        .await
    {
        Err(LedgerError::MissingOutcomeDetail(status)) => {
            assert_eq!(status, JobStatus::Failed);
        }
        other => panic!("Expected MissingOutcomeDetail, got {:?}", other),
    }

    // The job is untouched and still completes normally.
    let outcome = dal
        .jobs()
        .transition(job_id, JobStatus::Completed, Some("r1".into()), None)
        .await
        .expect("Completion failed");
    assert_eq!(outcome, TransitionOutcome::Applied);
}

#[tokio::test]
async fn test_claim_ready_has_a_single_winner() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    let job_id = dal
        .jobs()
        .create("u1", json!({"query": "SELECT 1"}))
        .await
        .expect("Failed to create job");

    // First claimer wins the job and its outbox row is consumed.
    let claimed = dal.jobs().claim_ready(10).await.expect("Claim failed");
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, job_id);
    assert_eq!(claimed[0].owner, "u1");

    // A concurrent claimer arriving second sees nothing.
    let claimed = dal.jobs().claim_ready(10).await.expect("Claim failed");
    assert!(claimed.is_empty());

    let admin = Caller::admin("ops");
    let job = dal.jobs().get(job_id, &admin).await.expect("Read failed");
    assert_eq!(job.status, JobStatus::Running);
}

#[tokio::test]
async fn test_claim_ready_respects_limit() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    for i in 0..5 {
        dal.jobs()
            .create("u1", json!({"query": format!("SELECT {}", i)}))
            .await
            .expect("Failed to create job");
    }

    let first = dal.jobs().claim_ready(3).await.expect("Claim failed");
    assert_eq!(first.len(), 3);
    let second = dal.jobs().claim_ready(3).await.expect("Claim failed");
    assert_eq!(second.len(), 2);

    // No job was claimed twice.
    let mut ids: Vec<Uuid> = first.iter().chain(second.iter()).map(|j| j.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5);
}

#[tokio::test]
async fn test_fail_stale_sweeps_only_old_running_jobs() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    let running = dal
        .jobs()
        .create("u1", json!({"query": "SELECT 1"}))
        .await
        .expect("Failed to create job");
    dal.jobs()
        .transition(running, JobStatus::Running, None, None)
        .await
        .expect("Start failed");

    let pending = dal
        .jobs()
        .create("u1", json!({"query": "SELECT 2"}))
        .await
        .expect("Failed to create job");

    // A cutoff in the past sweeps nothing.
    let swept = dal
        .jobs()
        .fail_stale(Utc::now() - ChronoDuration::hours(1))
        .await
        .expect("Sweep failed");
    assert!(swept.is_empty());

    // A cutoff after the job's last update sweeps the Running job only.
    let swept = dal
        .jobs()
        .fail_stale(Utc::now() + ChronoDuration::seconds(1))
        .await
        .expect("Sweep failed");
    assert_eq!(swept, vec![running]);

    let admin = Caller::admin("ops");
    let job = dal.jobs().get(running, &admin).await.expect("Read failed");
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_class.as_deref(), Some("stale_execution"));

    let job = dal.jobs().get(pending, &admin).await.expect("Read failed");
    assert_eq!(job.status, JobStatus::Pending);
}
