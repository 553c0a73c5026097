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

//! Integration tests for the ingestion gate and the batch applier.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serial_test::serial;

use sluice::config::IngestConfig;
use sluice::ingest::{
    BatchApplier, BatchTrigger, FetchError, FilterRule, FilterSet, IngestGate, ItemOutcome,
    PayloadFetcher,
};
use sluice::models::EventDescriptor;

use crate::fixtures::TestFixture;

/// Fetcher backed by an in-memory location -> payload map.
struct MapFetcher {
    payloads: HashMap<String, Vec<u8>>,
}

impl MapFetcher {
    fn new(entries: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            payloads: entries
                .iter()
                .map(|(loc, body)| (loc.to_string(), body.as_bytes().to_vec()))
                .collect(),
        })
    }
}

#[async_trait]
impl PayloadFetcher for MapFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
        self.payloads
            .get(location)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(location.to_string()))
    }
}

fn descriptor(location: &str) -> EventDescriptor {
    EventDescriptor::new(location, 1024, Utc::now(), "application/json")
}

fn event_filters() -> FilterSet {
    FilterSet::new(vec![FilterRule::new("raw/events/", ".json")])
}

fn short_window_config(batch_max_size: usize, window: Duration) -> IngestConfig {
    IngestConfig::builder()
        .batch_max_size(batch_max_size)
        .batch_window(window)
        .visibility_timeout(Duration::from_secs(300))
        .max_deliveries(3)
        .claim_poll_interval(Duration::from_millis(20))
        .build()
        .expect("Bad config")
}

#[tokio::test]
async fn test_gate_admits_only_matching_descriptors() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();
    let gate = IngestGate::new(dal.clone(), event_filters());

    // Matching prefix and suffix: admitted and enqueued.
    let admitted = gate
        .offer(&descriptor("raw/events/2026/08/30/a.json"))
        .await
        .expect("Offer failed");
    assert!(admitted.is_some());

    // Wrong prefix, wrong suffix, and almost-but-not-quite paths are all
    // dropped without a trace.
    for location in [
        "raw/other/a.json",
        "raw/events/a.parquet",
        "staging/raw/events/a.json",
        "raw/events/a.json.tmp",
    ] {
        let admitted = gate
            .offer(&descriptor(location))
            .await
            .expect("Offer failed");
        assert!(admitted.is_none(), "{} should not be admitted", location);
    }

    // Only the admitted descriptor produced an envelope.
    let claimed = dal
        .channel()
        .claim(10, Duration::from_secs(300), 3)
        .await
        .expect("Claim failed");
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].descriptor.location, "raw/events/2026/08/30/a.json");
}

#[tokio::test]
async fn test_gate_admits_on_any_rule_match() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();
    let filters = FilterSet::new(vec![
        FilterRule::new("raw/events/", ".json"),
        FilterRule::new("raw/audit/", ".jsonl"),
    ]);
    let gate = IngestGate::new(dal, filters);

    assert!(gate
        .offer(&descriptor("raw/audit/2026/a.jsonl"))
        .await
        .expect("Offer failed")
        .is_some());
    assert!(gate
        .offer(&descriptor("raw/audit/2026/a.json"))
        .await
        .expect("Offer failed")
        .is_none());
}

#[tokio::test]
async fn test_batch_closes_on_size_threshold() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    for i in 0..15 {
        dal.channel()
            .enqueue(&descriptor(&format!("raw/events/{}.json", i)))
            .await
            .expect("Enqueue failed");
    }

    let config = short_window_config(10, Duration::from_secs(5));
    let applier = BatchApplier::new(dal.clone(), MapFetcher::new(&[]), config);

    // A full backlog closes the batch at the size threshold without
    // waiting out the window.
    let batch = applier.form_batch().await.expect("Formation failed");
    assert_eq!(batch.envelopes.len(), 10);
    assert_eq!(batch.trigger, BatchTrigger::SizeThreshold);
}

// Timing-sensitive: batch windows run against the real clock.
#[tokio::test]
#[serial]
async fn test_partial_batch_closes_when_window_elapses() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    for i in 0..5 {
        dal.channel()
            .enqueue(&descriptor(&format!("raw/events/{}.json", i)))
            .await
            .expect("Enqueue failed");
    }

    let config = short_window_config(10, Duration::from_millis(200));
    let applier = BatchApplier::new(dal.clone(), MapFetcher::new(&[]), config);

    let batch = applier.form_batch().await.expect("Formation failed");
    assert_eq!(batch.envelopes.len(), 5);
    assert_eq!(batch.trigger, BatchTrigger::WindowElapsed);

    // With nothing buffered at all, the window closes an empty batch.
    let batch = applier.form_batch().await.expect("Formation failed");
    assert!(batch.envelopes.is_empty());
    assert_eq!(batch.trigger, BatchTrigger::WindowElapsed);
}

#[tokio::test]
async fn test_applied_batch_commits_and_acks() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    let fetcher = MapFetcher::new(&[
        ("raw/events/a.json", r#"{"device": "a", "reading": 1}"#),
        ("raw/events/b.json", r#"{"device": "b", "reading": 2}"#),
    ]);
    let descriptors = [descriptor("raw/events/a.json"), descriptor("raw/events/b.json")];
    for d in &descriptors {
        dal.channel().enqueue(d).await.expect("Enqueue failed");
    }

    let config = short_window_config(10, Duration::from_millis(200));
    let applier = BatchApplier::new(dal.clone(), fetcher, config);

    let batch = applier.form_batch().await.expect("Formation failed");
    assert_eq!(batch.envelopes.len(), 2);
    let outcomes = applier.apply(batch).await.expect("Apply failed");
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, ItemOutcome::Applied { .. })));

    // Records landed under their natural keys, carrying the transformed
    // document.
    assert_eq!(dal.records().count().await.expect("Count failed"), 2);
    let record = dal
        .records()
        .get(descriptors[0].natural_key())
        .await
        .expect("Get failed")
        .expect("Record should exist");
    assert_eq!(record.source_location, "raw/events/a.json");
    assert_eq!(record.document["attributes"]["device"], "a");
    assert_eq!(record.document["attributes"]["reading"], 1);

    // Every committed envelope was acknowledged.
    let claimed = dal
        .channel()
        .claim(10, Duration::from_secs(300), 3)
        .await
        .expect("Claim failed");
    assert!(claimed.is_empty());
}

#[tokio::test]
async fn test_malformed_item_is_isolated_from_the_batch() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    let fetcher = MapFetcher::new(&[
        ("raw/events/good1.json", r#"{"ok": 1}"#),
        ("raw/events/broken.json", "this is not json"),
        ("raw/events/good2.json", r#"{"ok": 2}"#),
    ]);
    let broken = descriptor("raw/events/broken.json");
    for d in [
        descriptor("raw/events/good1.json"),
        broken.clone(),
        descriptor("raw/events/good2.json"),
    ] {
        dal.channel().enqueue(&d).await.expect("Enqueue failed");
    }

    let config = short_window_config(10, Duration::from_millis(200));
    let applier = BatchApplier::new(dal.clone(), fetcher, config);

    let batch = applier.form_batch().await.expect("Formation failed");
    let broken_id = batch
        .envelopes
        .iter()
        .find(|e| e.descriptor.location == broken.location)
        .expect("Broken envelope should be in the batch")
        .id;
    let outcomes = applier.apply(batch).await.expect("Apply failed");

    // The malformed item failed alone; the rest of the batch committed.
    let failed: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match o {
            ItemOutcome::ValidationFailed { envelope_id, reason } => Some((envelope_id, reason)),
            _ => None,
        })
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(*failed[0].0, broken_id);
    assert!(failed[0].1.contains("JSON"));
    assert_eq!(dal.records().count().await.expect("Count failed"), 2);

    // The failed envelope is back on the channel heading toward its
    // delivery budget; the committed ones are gone.
    let claimed = dal
        .channel()
        .claim(10, Duration::from_secs(300), 3)
        .await
        .expect("Claim failed");
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, broken_id);
    assert_eq!(claimed[0].delivery_count, 2);
}

#[tokio::test]
async fn test_reapplying_a_redelivery_is_an_upsert() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    let fetcher = MapFetcher::new(&[("raw/events/a.json", r#"{"reading": 1}"#)]);
    let d = descriptor("raw/events/a.json");

    let config = short_window_config(10, Duration::from_millis(200));
    let applier = BatchApplier::new(dal.clone(), fetcher, config);

    // First delivery.
    dal.channel().enqueue(&d).await.expect("Enqueue failed");
    let batch = applier.form_batch().await.expect("Formation failed");
    applier.apply(batch).await.expect("Apply failed");
    assert_eq!(dal.records().count().await.expect("Count failed"), 1);

    // The same arrival redelivered (e.g. after a lost ack) lands on the
    // same natural key instead of duplicating the record.
    dal.channel().enqueue(&d).await.expect("Enqueue failed");
    let batch = applier.form_batch().await.expect("Formation failed");
    let outcomes = applier.apply(batch).await.expect("Apply failed");
    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        ItemOutcome::Applied { natural_key, .. } => assert_eq!(*natural_key, d.natural_key()),
        other => panic!("Expected Applied, got {:?}", other),
    }
    assert_eq!(dal.records().count().await.expect("Count failed"), 1);
}

#[tokio::test]
async fn test_commit_failure_acks_nothing_and_releases() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    let fetcher = MapFetcher::new(&[
        ("raw/events/a.json", r#"{"reading": 1}"#),
        ("raw/events/b.json", r#"{"reading": 2}"#),
    ]);
    for location in ["raw/events/a.json", "raw/events/b.json"] {
        dal.channel()
            .enqueue(&descriptor(location))
            .await
            .expect("Enqueue failed");
    }

    let config = short_window_config(10, Duration::from_millis(200));
    let applier = BatchApplier::new(dal.clone(), fetcher, config);
    let batch = applier.form_batch().await.expect("Formation failed");
    assert_eq!(batch.envelopes.len(), 2);

    // Sabotage the store so the batch transaction cannot commit.
    let conn = fixture
        .database()
        .get_connection()
        .await
        .expect("Failed to get connection");
    conn.interact(|conn| {
        use diesel::RunQueryDsl;
        diesel::sql_query("DROP TABLE ingested_records").execute(conn)
    })
    .await
    .expect("Interact failed")
    .expect("Drop failed");
    drop(conn);

    match applier.apply(batch).await {
        Err(sluice::error::ApplyError::CommitFailed(_)) => {}
        other => panic!("Expected CommitFailed, got {:?}", other),
    }

    // Nothing was acknowledged: both envelopes are immediately claimable
    // again, released rather than waiting out the visibility window.
    let claimed = dal
        .channel()
        .claim(10, Duration::from_secs(300), 3)
        .await
        .expect("Claim failed");
    assert_eq!(claimed.len(), 2);
    assert!(claimed.iter().all(|e| e.delivery_count == 2));
}

#[tokio::test]
async fn test_missing_payload_counts_as_item_failure() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal();

    // The notifier told us about a blob that has since been deleted.
    dal.channel()
        .enqueue(&descriptor("raw/events/gone.json"))
        .await
        .expect("Enqueue failed");

    let config = short_window_config(10, Duration::from_millis(200));
    let applier = BatchApplier::new(dal.clone(), MapFetcher::new(&[]), config);

    let batch = applier.form_batch().await.expect("Formation failed");
    let outcomes = applier.apply(batch).await.expect("Apply failed");
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(
        outcomes[0],
        ItemOutcome::ValidationFailed { .. }
    ));
    assert_eq!(dal.records().count().await.expect("Count failed"), 0);
}
