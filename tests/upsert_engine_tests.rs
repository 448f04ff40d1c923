// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upsert engine behavior against an in-memory store.
//!
//! These tests verify that:
//! 1. New external IDs create exactly one row
//! 2. Unchanged activities cause no writes
//! 3. Changed activities update only the changed fields
//! 4. Duplicate IDs within a batch never create two rows
//! 5. A failed write does not stop the run

use std::sync::Mutex;

use strava_notion_sync::models::{DestinationRow, Field};
use strava_notion_sync::services::{
    DestinationIndex, Outcome, Progress, SyncEvent, SyncOptions, SyncReport, UpsertEngine,
};
use strava_notion_sync::time_utils;

mod common;
use common::{activity, MemoryStore, Write};

async fn sync_with(
    store: &MemoryStore,
    activities: Vec<strava_notion_sync::models::Activity>,
    options: SyncOptions,
) -> SyncReport {
    let index = DestinationIndex::load(store).await.unwrap();
    UpsertEngine::new(store, index, options)
        .run(activities, None)
        .await
}

async fn sync(
    store: &MemoryStore,
    activities: Vec<strava_notion_sync::models::Activity>,
) -> SyncReport {
    sync_with(store, activities, SyncOptions::default()).await
}

#[tokio::test]
async fn test_morning_run_into_empty_store() {
    let store = MemoryStore::new();

    let report = sync(&store, vec![activity(123, "Morning Run", 5200.0)]).await;

    assert_eq!(report.created, 1);
    assert_eq!(report.writes(), 1);

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.external_id.as_deref(), Some("123"));
    assert_eq!(row.name, "Morning Run");
    assert_eq!(row.distance_km, Some(5.2));
    assert_eq!(
        row.date.map(time_utils::format_local).as_deref(),
        Some("2024-01-01T07:00:00")
    );
}

#[tokio::test]
async fn test_unchanged_activity_performs_no_writes() {
    let existing = activity(1, "Lunch Ride", 20000.0);
    let store = MemoryStore::with_rows(vec![DestinationRow::from_activity(
        "page-a".to_string(),
        &existing,
    )]);

    let report = sync(&store, vec![existing]).await;

    assert_eq!(report.unchanged, 1);
    assert_eq!(report.writes(), 0);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_changed_field_updates_only_that_field() {
    let original = activity(1, "Lunch Ride", 20000.0);
    let store = MemoryStore::with_rows(vec![DestinationRow::from_activity(
        "page-a".to_string(),
        &original,
    )]);

    let renamed = activity(1, "Hilly Lunch Ride", 20000.0);
    let report = sync(&store, vec![renamed]).await;

    assert_eq!(report.updated, 1);
    assert_eq!(
        store.writes(),
        vec![Write::Update {
            row_id: "page-a".to_string(),
            fields: vec![Field::Name],
        }]
    );
    assert_eq!(store.rows()[0].name, "Hilly Lunch Ride");
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let store = MemoryStore::new();
    let batch = vec![
        activity(1, "One", 1000.0),
        activity(2, "Two", 2000.0),
        activity(3, "Three", 3000.0),
    ];

    let first = sync(&store, batch.clone()).await;
    assert_eq!(first.created, 3);
    store.clear_writes();

    let second = sync(&store, batch).await;
    assert_eq!(second.unchanged, 3);
    assert_eq!(second.writes(), 0);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn test_duplicate_ids_in_batch_last_write_wins() {
    let store = MemoryStore::new();

    let report = sync(
        &store,
        vec![
            activity(7, "First Name", 1000.0),
            activity(8, "Other", 1000.0),
            activity(7, "Second Name", 1000.0),
        ],
    )
    .await;

    assert_eq!(report.created, 2);
    assert_eq!(report.updated, 1);
    let rows = store.rows_for("7");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Second Name");
}

#[tokio::test]
async fn test_duplicate_ids_with_concurrency_create_one_row() {
    let store = MemoryStore::new();
    let mut batch = Vec::new();
    for round in 0..3 {
        for id in 1..=10 {
            batch.push(activity(id, &format!("Activity {} v{}", id, round), 1000.0));
        }
    }

    let options = SyncOptions {
        concurrency: 4,
        ..Default::default()
    };
    let report = sync_with(&store, batch, options).await;

    assert_eq!(report.created, 10);
    assert_eq!(report.updated, 20);
    assert_eq!(store.rows().len(), 10);
    for id in 1..=10 {
        let rows = store.rows_for(&id.to_string());
        assert_eq!(rows.len(), 1, "external ID {} duplicated", id);
        assert_eq!(rows[0].name, format!("Activity {} v2", id));
    }
}

#[tokio::test]
async fn test_failed_write_is_reported_and_run_continues() {
    let store = MemoryStore::new();
    store.fail_writes_for("2");

    let report = sync(
        &store,
        vec![
            activity(1, "One", 1000.0),
            activity(2, "Broken", 1000.0),
            activity(3, "Three", 1000.0),
        ],
    )
    .await;

    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 1);
    assert!(report.has_failures());
    assert_eq!(report.failures[0].external_id, "2");
    assert_eq!(report.failures[0].name, "Broken");
    assert_eq!(store.rows().len(), 2);
    assert!(store.rows_for("3").len() == 1);
}

#[tokio::test]
async fn test_failed_create_is_retried_by_later_duplicate() {
    // The failed create must not be recorded in the index, so a later
    // occurrence still creates rather than updates a row that does not exist.
    let store = MemoryStore::new();
    store.fail_writes_for("5");
    let report = sync(&store, vec![activity(5, "A", 1000.0), activity(5, "B", 1000.0)]).await;

    assert_eq!(report.failed, 2);
    assert_eq!(report.updated, 0);
    assert!(store.rows().is_empty());
}

#[tokio::test]
async fn test_dry_run_plans_without_writing() {
    let existing = activity(1, "Old Name", 1000.0);
    let store = MemoryStore::with_rows(vec![DestinationRow::from_activity(
        "page-a".to_string(),
        &existing,
    )]);

    let options = SyncOptions {
        dry_run: true,
        ..Default::default()
    };
    let report = sync_with(
        &store,
        vec![
            activity(1, "New Name", 1000.0),
            activity(2, "Brand New", 1000.0),
            activity(2, "Brand New Again", 1000.0),
        ],
        options,
    )
    .await;

    assert!(report.dry_run);
    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 2);
    assert!(store.writes().is_empty());
    assert_eq!(store.rows().len(), 1);
}

#[tokio::test]
async fn test_progress_reports_every_activity_in_order() {
    let existing = activity(1, "Same", 1000.0);
    let store = MemoryStore::with_rows(vec![DestinationRow::from_activity(
        "page-a".to_string(),
        &existing,
    )]);
    let index = DestinationIndex::load(&store).await.unwrap();
    let engine = UpsertEngine::new(&store, index, SyncOptions::default());

    let events = Mutex::new(Vec::new());
    let progress: Progress<'_> = &|event: &SyncEvent<'_>| {
        events
            .lock()
            .unwrap()
            .push((event.external_id.to_string(), event.outcome.clone()));
    };
    engine
        .run(vec![existing, activity(2, "New", 1000.0)], Some(progress))
        .await;

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            ("1".to_string(), Outcome::Unchanged),
            ("2".to_string(), Outcome::Created),
        ]
    );
    assert!(engine.index().contains("2"));
}
