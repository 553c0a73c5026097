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

//! Ingested record operations.
//!
//! The batch applier's persistent store boundary: one transaction per
//! batch containing N upserts keyed by each record's natural key, so
//! reapplying the same validated payload is safe under at-least-once
//! redelivery.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use super::models::{NewSqliteIngestedRecord, SqliteIngestedRecord};
use super::DAL;
use crate::database::schema::ingested_records;
use crate::database::types::{blob_to_uuid, now_text, text_to_ts, uuid_to_blob};
use crate::error::RecordError;

/// A validated, transformed batch item ready to be written.
#[derive(Debug, Clone)]
pub struct StagedRecord {
    /// Stable key derived from immutable descriptor fields.
    pub natural_key: Uuid,
    pub source_location: String,
    /// The transformed document in the target schema.
    pub document: serde_json::Value,
    /// SHA-256 hex digest of the raw payload.
    pub content_hash: String,
}

/// A record read back from the store.
#[derive(Debug, Clone)]
pub struct IngestedRecord {
    pub natural_key: Uuid,
    pub source_location: String,
    pub document: serde_json::Value,
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
}

impl TryFrom<SqliteIngestedRecord> for IngestedRecord {
    type Error = String;

    fn try_from(row: SqliteIngestedRecord) -> Result<Self, Self::Error> {
        Ok(IngestedRecord {
            natural_key: blob_to_uuid(&row.natural_key)
                .map_err(|e| format!("bad natural key: {}", e))?,
            source_location: row.source_location,
            document: serde_json::from_str(&row.document)
                .map_err(|e| format!("bad document: {}", e))?,
            content_hash: row.content_hash,
            ingested_at: text_to_ts(&row.ingested_at)
                .map_err(|e| format!("bad ingested_at: {}", e))?,
        })
    }
}

/// Data access for ingested records.
pub struct RecordDAL<'a> {
    pub(crate) dal: &'a DAL,
}

impl<'a> RecordDAL<'a> {
    /// Writes a batch of staged records in one transaction.
    ///
    /// Each record is upserted by its natural key; if the transaction
    /// fails, none of the records are written. Returns the number of rows
    /// written.
    pub async fn upsert_batch(&self, records: Vec<StagedRecord>) -> Result<usize, RecordError> {
        if records.is_empty() {
            return Ok(0);
        }

        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| RecordError::ConnectionPool(e.to_string()))?;

        let count = records.len();
        let rows: Vec<NewSqliteIngestedRecord> = records
            .into_iter()
            .map(|r| NewSqliteIngestedRecord {
                natural_key: uuid_to_blob(r.natural_key),
                source_location: r.source_location,
                document: r.document.to_string(),
                content_hash: r.content_hash,
                ingested_at: now_text(),
            })
            .collect();

        conn.interact(move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                for row in &rows {
                    diesel::insert_into(ingested_records::table)
                        .values(row)
                        .on_conflict(ingested_records::natural_key)
                        .do_update()
                        .set((
                            ingested_records::source_location.eq(&row.source_location),
                            ingested_records::document.eq(&row.document),
                            ingested_records::content_hash.eq(&row.content_hash),
                            ingested_records::ingested_at.eq(&row.ingested_at),
                        ))
                        .execute(conn)?;
                }
                Ok(())
            })
        })
        .await
        .map_err(|e| RecordError::ConnectionPool(e.to_string()))??;

        info!(count, "Committed ingested record batch");
        Ok(count)
    }

    /// Fetches a record by natural key.
    pub async fn get(&self, natural_key: Uuid) -> Result<Option<IngestedRecord>, RecordError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| RecordError::ConnectionPool(e.to_string()))?;

        let key_blob = uuid_to_blob(natural_key);
        let row: Option<SqliteIngestedRecord> = conn
            .interact(move |conn| {
                ingested_records::table
                    .find(key_blob)
                    .select(SqliteIngestedRecord::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| RecordError::ConnectionPool(e.to_string()))??;

        row.map(|r| IngestedRecord::try_from(r).map_err(RecordError::Storage))
            .transpose()
    }

    /// Total number of ingested records.
    pub async fn count(&self) -> Result<i64, RecordError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| RecordError::ConnectionPool(e.to_string()))?;

        let count = conn
            .interact(move |conn| ingested_records::table.count().get_result(conn))
            .await
            .map_err(|e| RecordError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }
}
