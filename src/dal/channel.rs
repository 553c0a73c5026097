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

//! Buffering channel operations.
//!
//! Models an at-least-once delivery channel on the shared store:
//!
//! - Claiming hides an envelope from other consumers until its visibility
//!   deadline and increments its delivery count.
//! - Acknowledgment deletes it; explicit failure makes it immediately
//!   redeliverable.
//! - An envelope whose delivery count would exceed the configured ceiling
//!   is diverted to the dead-letter state inside the claim transaction and
//!   never returned to a consumer.
//!
//! Multiple consumers may claim concurrently; the claim transaction
//! guarantees each envelope is visible to at most one of them at a time.

use std::time::Duration;

use diesel::prelude::*;
use tracing::{debug, warn};
use uuid::Uuid;

use super::models::{NewSqliteEnvelope, SqliteEnvelope};
use super::DAL;
use crate::database::schema::envelopes;
use crate::database::types::{now_text, ts_to_text, uuid_to_blob};
use crate::error::ChannelError;
use crate::models::{Envelope, EventDescriptor};

/// Data access for the buffering channel.
pub struct ChannelDAL<'a> {
    pub(crate) dal: &'a DAL,
}

impl<'a> ChannelDAL<'a> {
    /// Enqueues a descriptor as a new, immediately visible envelope.
    pub async fn enqueue(&self, descriptor: &EventDescriptor) -> Result<Uuid, ChannelError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ChannelError::ConnectionPool(e.to_string()))?;

        let envelope_id = Uuid::new_v4();
        let now = now_text();
        let row = NewSqliteEnvelope {
            id: uuid_to_blob(envelope_id),
            location: descriptor.location.clone(),
            size: descriptor.size,
            content_type: descriptor.content_type_hint.clone(),
            arrived_at: ts_to_text(descriptor.arrived_at),
            delivery_count: 0,
            enqueued_at: now.clone(),
            visible_at: now,
            dead_letter: false,
        };

        conn.interact(move |conn| {
            diesel::insert_into(envelopes::table)
                .values(&row)
                .execute(conn)
        })
        .await
        .map_err(|e| ChannelError::ConnectionPool(e.to_string()))??;

        debug!(envelope_id = %envelope_id, "Enqueued envelope");
        Ok(envelope_id)
    }

    /// Claims up to `max` visible envelopes for one consumer.
    ///
    /// Claimed envelopes become invisible until `visibility_timeout`
    /// elapses; their delivery count is incremented. Candidates whose
    /// incremented count would exceed `max_deliveries` are diverted to the
    /// dead-letter state instead of being returned.
    pub async fn claim(
        &self,
        max: usize,
        visibility_timeout: Duration,
        max_deliveries: i32,
    ) -> Result<Vec<Envelope>, ChannelError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ChannelError::ConnectionPool(e.to_string()))?;

        let max = max as i64;
        let claimed: Vec<SqliteEnvelope> = conn
            .interact(move |conn| {
                conn.transaction::<Vec<SqliteEnvelope>, diesel::result::Error, _>(|conn| {
                    let now_ts = chrono::Utc::now();
                    let now = ts_to_text(now_ts);
                    let deadline = ts_to_text(
                        now_ts + chrono::Duration::from_std(visibility_timeout).unwrap_or_default(),
                    );

                    let candidates: Vec<SqliteEnvelope> = envelopes::table
                        .filter(
                            envelopes::dead_letter
                                .eq(false)
                                .and(envelopes::visible_at.le(&now)),
                        )
                        .order(envelopes::enqueued_at.asc())
                        .limit(max)
                        .select(SqliteEnvelope::as_select())
                        .load(conn)?;

                    if candidates.is_empty() {
                        return Ok(Vec::new());
                    }

                    let (exhausted, deliverable): (Vec<_>, Vec<_>) = candidates
                        .into_iter()
                        .partition(|e| e.delivery_count + 1 > max_deliveries);

                    if !exhausted.is_empty() {
                        let ids: Vec<&Vec<u8>> = exhausted.iter().map(|e| &e.id).collect();
                        diesel::update(envelopes::table.filter(envelopes::id.eq_any(ids)))
                            .set(envelopes::dead_letter.eq(true))
                            .execute(conn)?;
                    }

                    if !deliverable.is_empty() {
                        let ids: Vec<&Vec<u8>> = deliverable.iter().map(|e| &e.id).collect();
                        diesel::update(envelopes::table.filter(envelopes::id.eq_any(ids)))
                            .set((
                                envelopes::delivery_count.eq(envelopes::delivery_count + 1),
                                envelopes::visible_at.eq(&deadline),
                            ))
                            .execute(conn)?;
                    }

                    Ok(deliverable
                        .into_iter()
                        .map(|mut e| {
                            e.delivery_count += 1;
                            e.visible_at = deadline.clone();
                            e
                        })
                        .collect())
                })
            })
            .await
            .map_err(|e| ChannelError::ConnectionPool(e.to_string()))??;

        claimed
            .into_iter()
            .map(|row| Envelope::try_from(row).map_err(ChannelError::Storage))
            .collect()
    }

    /// Acknowledges an envelope, deleting it from the channel.
    ///
    /// Acknowledging an envelope that no longer exists is a no-op: under
    /// at-least-once delivery another consumer may have already handled it.
    pub async fn ack(&self, envelope_id: Uuid) -> Result<(), ChannelError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ChannelError::ConnectionPool(e.to_string()))?;

        let id_blob = uuid_to_blob(envelope_id);
        let deleted = conn
            .interact(move |conn| {
                diesel::delete(envelopes::table.filter(envelopes::id.eq(&id_blob))).execute(conn)
            })
            .await
            .map_err(|e| ChannelError::ConnectionPool(e.to_string()))??;

        if deleted == 0 {
            debug!(envelope_id = %envelope_id, "Ack for already-deleted envelope");
        }
        Ok(())
    }

    /// Records a per-item failure and makes the envelope immediately
    /// redeliverable.
    ///
    /// The delivery count is not touched here; it increments on the next
    /// claim, which is what eventually routes a persistently failing
    /// envelope to the dead-letter state.
    pub async fn fail(&self, envelope_id: Uuid, reason: &str) -> Result<(), ChannelError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ChannelError::ConnectionPool(e.to_string()))?;

        let id_blob = uuid_to_blob(envelope_id);
        let stored = reason.to_string();
        conn.interact(move |conn| {
            diesel::update(envelopes::table.filter(envelopes::id.eq(&id_blob)))
                .set((
                    envelopes::visible_at.eq(now_text()),
                    envelopes::last_error.eq(&stored),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| ChannelError::ConnectionPool(e.to_string()))??;

        warn!(envelope_id = %envelope_id, %reason, "Envelope failed, eligible for redelivery");
        Ok(())
    }

    /// Returns unacknowledged envelopes to visibility without penalty.
    ///
    /// Used when a batch commit fails: none of the batch's envelopes were
    /// acknowledged, and releasing them bounds the retry latency instead
    /// of waiting out the visibility window.
    pub async fn release(&self, envelope_ids: &[Uuid]) -> Result<(), ChannelError> {
        if envelope_ids.is_empty() {
            return Ok(());
        }

        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ChannelError::ConnectionPool(e.to_string()))?;

        let blobs: Vec<Vec<u8>> = envelope_ids.iter().copied().map(uuid_to_blob).collect();
        conn.interact(move |conn| {
            diesel::update(envelopes::table.filter(envelopes::id.eq_any(&blobs)))
                .set(envelopes::visible_at.eq(now_text()))
                .execute(conn)
        })
        .await
        .map_err(|e| ChannelError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Lists envelopes diverted to the dead-letter state, oldest first.
    pub async fn dead_letters(&self) -> Result<Vec<Envelope>, ChannelError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ChannelError::ConnectionPool(e.to_string()))?;

        let rows: Vec<SqliteEnvelope> = conn
            .interact(move |conn| {
                envelopes::table
                    .filter(envelopes::dead_letter.eq(true))
                    .order(envelopes::enqueued_at.asc())
                    .select(SqliteEnvelope::as_select())
                    .load(conn)
            })
            .await
            .map_err(|e| ChannelError::ConnectionPool(e.to_string()))??;

        rows.into_iter()
            .map(|row| Envelope::try_from(row).map_err(ChannelError::Storage))
            .collect()
    }
}
