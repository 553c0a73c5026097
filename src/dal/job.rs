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

//! Job ledger operations.
//!
//! The ledger is the single source of truth for whether a request ran and
//! what happened. Status transitions are guarded compare-and-swap updates:
//! the UPDATE carries the expected current status in its WHERE clause, so
//! two workers racing to claim the same job can never both win. Repeating
//! an already-applied transition is a success no-op, which makes completion
//! signals safe under at-least-once redelivery.

use diesel::prelude::*;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{NewSqliteJob, NewSqliteJobOutbox, SqliteJob, SqliteJobOutbox};
use super::DAL;
use crate::database::schema::{job_outbox, jobs};
use crate::database::types::{blob_to_uuid, now_text, ts_to_text, uuid_to_blob};
use crate::error::LedgerError;
use crate::models::{Caller, ClaimedJob, Job, JobStatus, JobSummary, Page};

/// Outcome of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition was applied by this call.
    Applied,
    /// The job was already in the requested state; nothing changed.
    AlreadyApplied,
}

/// Data access for the job ledger.
pub struct JobDAL<'a> {
    pub(crate) dal: &'a DAL,
}

impl<'a> JobDAL<'a> {
    /// Creates a job in the Pending state and enqueues it for execution.
    ///
    /// The job row and its outbox row are written in one transaction: the
    /// outbox row is the fire-and-forget handoff to the executor, so a job
    /// can never exist without a pending work signal (or vice versa).
    pub async fn create(
        &self,
        owner: &str,
        payload: serde_json::Value,
    ) -> Result<Uuid, LedgerError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let job_id = Uuid::new_v4();
        let now = now_text();
        let row = NewSqliteJob {
            id: uuid_to_blob(job_id),
            owner: owner.to_string(),
            payload: payload.to_string(),
            status: JobStatus::Pending.as_str().to_string(),
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        let outbox_row = NewSqliteJobOutbox {
            job_id: uuid_to_blob(job_id),
            created_at: now,
        };

        conn.interact(move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                diesel::insert_into(jobs::table).values(&row).execute(conn)?;
                diesel::insert_into(job_outbox::table)
                    .values(&outbox_row)
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
        .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        info!(job_id = %job_id, owner = %owner, "Created job");
        Ok(job_id)
    }

    /// Fetches a job by ID, enforcing ownership.
    ///
    /// Only the owning identity or an administrative caller may read a
    /// job.
    pub async fn get(&self, job_id: Uuid, caller: &Caller) -> Result<Job, LedgerError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let id_blob = uuid_to_blob(job_id);
        let row: Option<SqliteJob> = conn
            .interact(move |conn| {
                jobs::table
                    .find(id_blob)
                    .select(SqliteJob::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        let row = row.ok_or(LedgerError::NotFound(job_id))?;
        if !caller.can_read(&row.owner) {
            return Err(LedgerError::Forbidden(job_id));
        }
        Job::try_from(row).map_err(LedgerError::Storage)
    }

    /// Lists jobs owned by `owner`, newest first.
    pub async fn list(&self, owner: &str, page: Page) -> Result<Vec<JobSummary>, LedgerError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let owner = owner.to_string();
        let rows: Vec<SqliteJob> = conn
            .interact(move |conn| {
                jobs::table
                    .filter(jobs::owner.eq(&owner))
                    .order(jobs::created_at.desc())
                    .limit(page.limit)
                    .offset(page.offset)
                    .select(SqliteJob::as_select())
                    .load(conn)
            })
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        rows.into_iter()
            .map(|row| JobSummary::try_from(row).map_err(LedgerError::Storage))
            .collect()
    }

    /// Applies a guarded status transition.
    ///
    /// The UPDATE is a compare-and-swap against the expected predecessor
    /// status. Three outcomes:
    ///
    /// - The swap lands: `Ok(Applied)`.
    /// - The job is already in `new_status`: `Ok(AlreadyApplied)`, and the
    ///   record is left unchanged, tolerating at-least-once redelivery of
    ///   completion signals.
    /// - Anything else: `Err(InvalidTransition)`.
    ///
    /// Terminal transitions must carry their outcome detail: Completed
    /// requires `result_key`, Failed requires `error` (class, message).
    /// A terminal transition without it is rejected before any write, so
    /// a Completed job always references a result and a Failed job always
    /// carries an error.
    pub async fn transition(
        &self,
        job_id: Uuid,
        new_status: JobStatus,
        result_key: Option<String>,
        error: Option<(String, String)>,
    ) -> Result<TransitionOutcome, LedgerError> {
        match new_status {
            JobStatus::Completed if result_key.is_none() => {
                return Err(LedgerError::MissingOutcomeDetail(new_status));
            }
            JobStatus::Failed if error.is_none() => {
                return Err(LedgerError::MissingOutcomeDetail(new_status));
            }
            _ => {}
        }

        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let outcome = conn
            .interact(move |conn| {
                conn.transaction::<TransitionOutcome, LedgerError, _>(|conn| {
                    let id_blob = uuid_to_blob(job_id);
                    let now = now_text();

                    let affected = match new_status.predecessor() {
                        Some(expected) => {
                            let guard = jobs::table.filter(
                                jobs::id
                                    .eq(&id_blob)
                                    .and(jobs::status.eq(expected.as_str())),
                            );
                            match new_status {
                                JobStatus::Completed => diesel::update(guard)
                                    .set((
                                        jobs::status.eq(new_status.as_str()),
                                        jobs::result_key.eq(result_key.as_deref()),
                                        jobs::updated_at.eq(&now),
                                    ))
                                    .execute(conn)?,
                                JobStatus::Failed => {
                                    let (class, message) = match &error {
                                        Some((c, m)) => (Some(c.as_str()), Some(m.as_str())),
                                        None => (None, None),
                                    };
                                    diesel::update(guard)
                                        .set((
                                            jobs::status.eq(new_status.as_str()),
                                            jobs::error_class.eq(class),
                                            jobs::error_message.eq(message),
                                            jobs::updated_at.eq(&now),
                                        ))
                                        .execute(conn)?
                                }
                                _ => diesel::update(guard)
                                    .set((
                                        jobs::status.eq(new_status.as_str()),
                                        jobs::updated_at.eq(&now),
                                    ))
                                    .execute(conn)?,
                            }
                        }
                        // Nothing transitions into Pending.
                        None => 0,
                    };

                    if affected == 1 {
                        return Ok(TransitionOutcome::Applied);
                    }

                    // The swap did not land. Distinguish a missing job, an
                    // idempotent repeat, and a genuinely invalid transition.
                    let row: Option<SqliteJob> = jobs::table
                        .find(&id_blob)
                        .select(SqliteJob::as_select())
                        .first(conn)
                        .optional()?;
                    let row = row.ok_or(LedgerError::NotFound(job_id))?;
                    let current = JobStatus::parse(&row.status)
                        .ok_or_else(|| LedgerError::Storage(format!(
                            "unknown job status '{}'",
                            row.status
                        )))?;

                    if current == new_status {
                        Ok(TransitionOutcome::AlreadyApplied)
                    } else {
                        Err(LedgerError::InvalidTransition {
                            from: current,
                            to: new_status,
                        })
                    }
                })
            })
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        debug!(job_id = %job_id, status = %new_status, ?outcome, "Job transition");
        Ok(outcome)
    }

    /// Atomically claims up to `limit` pending jobs for execution.
    ///
    /// In one transaction: the oldest outbox rows are deleted and their
    /// jobs are swapped Pending -> Running. Concurrent claimers serialize
    /// on the write transaction, so each job is claimed exactly once; a
    /// claimer that arrives second simply finds no outbox rows.
    pub async fn claim_ready(&self, limit: usize) -> Result<Vec<ClaimedJob>, LedgerError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let limit = limit as i64;
        let claimed: Vec<SqliteJob> = conn
            .interact(move |conn| {
                conn.transaction::<Vec<SqliteJob>, diesel::result::Error, _>(|conn| {
                    let now = now_text();

                    let outbox_rows: Vec<SqliteJobOutbox> = job_outbox::table
                        .filter(job_outbox::created_at.le(&now))
                        .order(job_outbox::created_at.asc())
                        .limit(limit)
                        .select(SqliteJobOutbox::as_select())
                        .load(conn)?;

                    if outbox_rows.is_empty() {
                        return Ok(Vec::new());
                    }

                    let outbox_ids: Vec<i32> = outbox_rows.iter().map(|o| o.id).collect();
                    let job_ids: Vec<Vec<u8>> =
                        outbox_rows.into_iter().map(|o| o.job_id).collect();

                    diesel::delete(job_outbox::table)
                        .filter(job_outbox::id.eq_any(&outbox_ids))
                        .execute(conn)?;

                    // Guarded swap: only Pending jobs move to Running, so a
                    // stray duplicate outbox row cannot restart a job.
                    diesel::update(
                        jobs::table.filter(
                            jobs::id
                                .eq_any(&job_ids)
                                .and(jobs::status.eq(JobStatus::Pending.as_str())),
                        ),
                    )
                    .set((
                        jobs::status.eq(JobStatus::Running.as_str()),
                        jobs::updated_at.eq(&now),
                    ))
                    .execute(conn)?;

                    jobs::table
                        .filter(
                            jobs::id
                                .eq_any(&job_ids)
                                .and(jobs::status.eq(JobStatus::Running.as_str())),
                        )
                        .select(SqliteJob::as_select())
                        .load(conn)
                })
            })
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        claimed
            .into_iter()
            .map(|row| {
                let id = blob_to_uuid(&row.id)
                    .map_err(|e| LedgerError::Storage(format!("bad job id: {}", e)))?;
                let payload = serde_json::from_str(&row.payload)
                    .map_err(|e| LedgerError::Storage(format!("bad job payload: {}", e)))?;
                Ok(ClaimedJob {
                    id,
                    owner: row.owner,
                    payload,
                })
            })
            .collect()
    }

    /// Fails Running jobs whose `updated_at` predates `cutoff`.
    ///
    /// This is the staleness sweep: an executor that died mid-execution
    /// leaves its job Running forever, and this backstop surfaces that as
    /// a terminal failure instead of an ambiguous in-progress state.
    /// Returns the IDs of the jobs swept.
    pub async fn fail_stale(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Uuid>, LedgerError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))?;

        let cutoff_text = ts_to_text(cutoff);
        let swept: Vec<Vec<u8>> = conn
            .interact(move |conn| {
                conn.transaction::<Vec<Vec<u8>>, diesel::result::Error, _>(|conn| {
                    let now = now_text();

                    let stale: Vec<Vec<u8>> = jobs::table
                        .filter(
                            jobs::status
                                .eq(JobStatus::Running.as_str())
                                .and(jobs::updated_at.lt(&cutoff_text)),
                        )
                        .select(jobs::id)
                        .load(conn)?;

                    if stale.is_empty() {
                        return Ok(stale);
                    }

                    diesel::update(jobs::table.filter(jobs::id.eq_any(&stale)))
                        .set((
                            jobs::status.eq(JobStatus::Failed.as_str()),
                            jobs::error_class.eq("stale_execution"),
                            jobs::error_message
                                .eq("executor did not report completion within the execution bound"),
                            jobs::updated_at.eq(&now),
                        ))
                        .execute(conn)?;

                    Ok(stale)
                })
            })
            .await
            .map_err(|e| LedgerError::ConnectionPool(e.to_string()))??;

        swept
            .into_iter()
            .map(|blob| {
                blob_to_uuid(&blob).map_err(|e| LedgerError::Storage(format!("bad job id: {}", e)))
            })
            .collect()
    }
}
