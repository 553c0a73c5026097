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

//! SQLite row models.
//!
//! Diesel model definitions using SQLite-compatible types: UUIDs as BLOB
//! (`Vec<u8>`), timestamps as RFC3339 TEXT. These are internal to the DAL
//! and converted to/from domain types at the DAL boundary.

use diesel::prelude::*;

use crate::database::schema::{envelopes, ingested_records, job_outbox, jobs};
use crate::database::types::{blob_to_uuid, text_to_ts};
use crate::models::{Envelope, EventDescriptor, Job, JobStatus, JobSummary};

// ============================================================================
// Job Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteJob {
    pub id: Vec<u8>,
    pub owner: String,
    pub payload: String,
    pub status: String,
    pub result_key: Option<String>,
    pub error_class: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewSqliteJob {
    pub id: Vec<u8>,
    pub owner: String,
    pub payload: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SqliteJob> for Job {
    type Error = String;

    fn try_from(row: SqliteJob) -> Result<Self, Self::Error> {
        Ok(Job {
            id: blob_to_uuid(&row.id).map_err(|e| format!("bad job id: {}", e))?,
            owner: row.owner,
            payload: serde_json::from_str(&row.payload)
                .map_err(|e| format!("bad job payload: {}", e))?,
            status: JobStatus::parse(&row.status)
                .ok_or_else(|| format!("unknown job status '{}'", row.status))?,
            result_key: row.result_key,
            error_class: row.error_class,
            error_message: row.error_message,
            created_at: text_to_ts(&row.created_at)
                .map_err(|e| format!("bad created_at: {}", e))?,
            updated_at: text_to_ts(&row.updated_at)
                .map_err(|e| format!("bad updated_at: {}", e))?,
        })
    }
}

impl TryFrom<SqliteJob> for JobSummary {
    type Error = String;

    fn try_from(row: SqliteJob) -> Result<Self, Self::Error> {
        Ok(JobSummary {
            id: blob_to_uuid(&row.id).map_err(|e| format!("bad job id: {}", e))?,
            status: JobStatus::parse(&row.status)
                .ok_or_else(|| format!("unknown job status '{}'", row.status))?,
            created_at: text_to_ts(&row.created_at)
                .map_err(|e| format!("bad created_at: {}", e))?,
            updated_at: text_to_ts(&row.updated_at)
                .map_err(|e| format!("bad updated_at: {}", e))?,
        })
    }
}

// ============================================================================
// Job Outbox Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = job_outbox)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteJobOutbox {
    pub id: i32,
    pub job_id: Vec<u8>,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = job_outbox)]
pub struct NewSqliteJobOutbox {
    pub job_id: Vec<u8>,
    pub created_at: String,
}

// ============================================================================
// Envelope Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = envelopes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteEnvelope {
    pub id: Vec<u8>,
    pub location: String,
    pub size: i64,
    pub content_type: String,
    pub arrived_at: String,
    pub delivery_count: i32,
    pub enqueued_at: String,
    pub visible_at: String,
    pub dead_letter: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = envelopes)]
pub struct NewSqliteEnvelope {
    pub id: Vec<u8>,
    pub location: String,
    pub size: i64,
    pub content_type: String,
    pub arrived_at: String,
    pub delivery_count: i32,
    pub enqueued_at: String,
    pub visible_at: String,
    pub dead_letter: bool,
}

impl TryFrom<SqliteEnvelope> for Envelope {
    type Error = String;

    fn try_from(row: SqliteEnvelope) -> Result<Self, Self::Error> {
        Ok(Envelope {
            id: blob_to_uuid(&row.id).map_err(|e| format!("bad envelope id: {}", e))?,
            descriptor: EventDescriptor {
                location: row.location,
                size: row.size,
                arrived_at: text_to_ts(&row.arrived_at)
                    .map_err(|e| format!("bad arrived_at: {}", e))?,
                content_type_hint: row.content_type,
            },
            delivery_count: row.delivery_count,
            enqueued_at: text_to_ts(&row.enqueued_at)
                .map_err(|e| format!("bad enqueued_at: {}", e))?,
            visible_at: text_to_ts(&row.visible_at)
                .map_err(|e| format!("bad visible_at: {}", e))?,
            last_error: row.last_error,
        })
    }
}

// ============================================================================
// Ingested Record Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ingested_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteIngestedRecord {
    pub natural_key: Vec<u8>,
    pub source_location: String,
    pub document: String,
    pub content_hash: String,
    pub ingested_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = ingested_records)]
pub struct NewSqliteIngestedRecord {
    pub natural_key: Vec<u8>,
    pub source_location: String,
    pub document: String,
    pub content_hash: String,
    pub ingested_at: String,
}
