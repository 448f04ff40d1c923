// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity sync: fetch from Strava, map, and upsert into the destination.
//!
//! Handles the core workflow:
//! 1. Build the dedup index from the destination store
//! 2. Pick the incremental cursor (unless a full sync was requested)
//! 3. Fetch raw activities from Strava
//! 4. Map each record, skipping invalid ones
//! 5. Create, update or skip each activity
//!
//! Reads abort the run. Writes fail per record: the error is logged,
//! recorded in the report, and the run moves on.

use std::fmt;

use futures_util::{stream, StreamExt};

use crate::error::Result;
use crate::models::{Activity, DestinationRow, Field};
use crate::services::index::DestinationIndex;
use crate::services::store::ActivityStore;
use crate::services::strava::StravaService;
use crate::time_utils;

/// Knobs for one sync run.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Ignore the incremental cursor and fetch everything.
    pub full: bool,
    /// Plan changes without writing.
    pub dry_run: bool,
    /// Maximum number of external IDs written concurrently.
    pub concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            full: false,
            dry_run: false,
            concurrency: 1,
        }
    }
}

/// What happened to one activity.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Created,
    /// Updated; carries the fields that changed.
    Updated(Vec<Field>),
    Unchanged,
    Failed(String),
}

/// Progress notification for one activity.
#[derive(Debug)]
pub struct SyncEvent<'a> {
    pub external_id: &'a str,
    pub name: &'a str,
    pub outcome: &'a Outcome,
}

/// Progress callback invoked once per activity.
pub type Progress<'a> = &'a (dyn Fn(&SyncEvent<'_>) + Sync);

/// A record whose write failed.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRecord {
    pub external_id: String,
    pub name: String,
    pub error: String,
}

/// Summary of a sync run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub dry_run: bool,
    /// Activities returned by Strava
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Writes that failed
    pub failed: usize,
    /// Records rejected by the mapper
    pub invalid: usize,
    pub failures: Vec<FailedRecord>,
}

impl SyncReport {
    fn record(&mut self, activity: &Activity, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated(_) => self.updated += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Failed(error) => {
                self.failed += 1;
                self.failures.push(FailedRecord {
                    external_id: activity.external_id.clone(),
                    name: activity.name.clone(),
                    error,
                });
            }
        }
    }

    /// Returns true if any write failed.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Number of create and update calls issued (or planned, in a dry run).
    pub fn writes(&self) -> usize {
        self.created + self.updated
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.dry_run {
            "Dry run complete (nothing written)"
        } else {
            "Sync complete"
        };
        write!(
            f,
            "{}: {} created, {} updated, {} unchanged, {} failed, {} invalid",
            prefix, self.created, self.updated, self.unchanged, self.failed, self.invalid
        )
    }
}

/// Creates, updates or skips activities against a destination store.
///
/// Owns the dedup index for the duration of one run.
pub struct UpsertEngine<'a, S: ActivityStore + ?Sized> {
    store: &'a S,
    index: DestinationIndex,
    dry_run: bool,
    concurrency: usize,
}

impl<'a, S: ActivityStore + ?Sized> UpsertEngine<'a, S> {
    pub fn new(store: &'a S, index: DestinationIndex, options: SyncOptions) -> Self {
        Self {
            store,
            index,
            dry_run: options.dry_run,
            concurrency: options.concurrency.max(1),
        }
    }

    pub fn index(&self) -> &DestinationIndex {
        &self.index
    }

    /// Upsert every activity and report the outcome.
    ///
    /// With `concurrency == 1` activities are processed strictly in input
    /// order. Otherwise they are grouped by external ID: each group runs
    /// sequentially in input order while different groups overlap. Either way
    /// a key is never written by two tasks at once, so duplicates within a
    /// batch produce one row and the last occurrence wins.
    pub async fn run(
        &self,
        activities: Vec<Activity>,
        progress: Option<Progress<'_>>,
    ) -> SyncReport {
        let groups = if self.concurrency == 1 {
            activities.into_iter().map(|a| vec![a]).collect()
        } else {
            group_by_external_id(activities)
        };

        let results: Vec<Vec<(Activity, Outcome)>> = stream::iter(groups)
            .map(|group| self.run_group(group, progress))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = SyncReport {
            dry_run: self.dry_run,
            ..Default::default()
        };
        for (activity, outcome) in results.into_iter().flatten() {
            report.record(&activity, outcome);
        }
        report
    }

    async fn run_group(
        &self,
        group: Vec<Activity>,
        progress: Option<Progress<'_>>,
    ) -> Vec<(Activity, Outcome)> {
        let mut outcomes = Vec::with_capacity(group.len());
        for activity in group {
            let outcome = match self.upsert(&activity).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(
                        external_id = %activity.external_id,
                        name = %activity.name,
                        error = %e,
                        "Failed to write activity, continuing"
                    );
                    Outcome::Failed(e.to_string())
                }
            };

            if let Some(progress) = progress {
                progress(&SyncEvent {
                    external_id: &activity.external_id,
                    name: &activity.name,
                    outcome: &outcome,
                });
            }
            outcomes.push((activity, outcome));
        }
        outcomes
    }

    /// Upsert one activity. Callers must not run two upserts for the same
    /// external ID at once.
    async fn upsert(&self, activity: &Activity) -> Result<Outcome> {
        let Some(existing) = self.index.get(&activity.external_id) else {
            let row_id = if self.dry_run {
                format!("dry-run:{}", activity.external_id)
            } else {
                self.store.create_row(activity).await?
            };
            tracing::info!(
                external_id = %activity.external_id,
                row_id = %row_id,
                dry_run = self.dry_run,
                "Created activity row"
            );
            self.index.insert(
                activity.external_id.clone(),
                DestinationRow::from_activity(row_id, activity),
            );
            return Ok(Outcome::Created);
        };

        let changed = activity.diff(&existing);
        if changed.is_empty() {
            tracing::debug!(external_id = %activity.external_id, "Activity unchanged");
            return Ok(Outcome::Unchanged);
        }

        if !self.dry_run {
            self.store
                .update_row(&existing.row_id, activity, &changed)
                .await?;
        }
        tracing::info!(
            external_id = %activity.external_id,
            row_id = %existing.row_id,
            fields = ?changed,
            dry_run = self.dry_run,
            "Updated activity row"
        );
        self.index.insert(
            activity.external_id.clone(),
            DestinationRow::from_activity(existing.row_id, activity),
        );
        Ok(Outcome::Updated(changed))
    }
}

/// Group activities by external ID, keeping first-seen order of groups and
/// input order within each group.
fn group_by_external_id(activities: Vec<Activity>) -> Vec<Vec<Activity>> {
    let mut positions: std::collections::HashMap<String, usize> = Default::default();
    let mut groups: Vec<Vec<Activity>> = Vec::new();

    for activity in activities {
        match positions.get(&activity.external_id) {
            Some(&i) => groups[i].push(activity),
            None => {
                positions.insert(activity.external_id.clone(), groups.len());
                groups.push(vec![activity]);
            }
        }
    }
    groups
}

/// Map raw Strava records, dropping invalid ones.
///
/// Returns the valid activities and the number of rejected records.
pub fn map_records(records: &[serde_json::Value]) -> (Vec<Activity>, usize) {
    let mut activities = Vec::with_capacity(records.len());
    let mut invalid = 0;

    for record in records {
        match Activity::from_strava(record) {
            Ok(activity) => activities.push(activity),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping invalid activity record");
                invalid += 1;
            }
        }
    }
    (activities, invalid)
}

/// Run a full sync: index, fetch, map, upsert.
pub async fn run_sync<S: ActivityStore + ?Sized>(
    strava: &StravaService,
    store: &S,
    options: SyncOptions,
    progress: Option<Progress<'_>>,
) -> Result<SyncReport> {
    let index = DestinationIndex::load(store).await?;

    let cursor = if options.full {
        None
    } else {
        index.most_recent().map(time_utils::incremental_cursor)
    };
    match cursor {
        Some(after) => tracing::info!(after = %after, "Incremental sync"),
        None => tracing::info!("Full sync"),
    }

    let records = strava.fetch_activities(cursor).await?;
    let (activities, invalid) = map_records(&records);

    let engine = UpsertEngine::new(store, index, options);
    let mut report = engine.run(activities, progress).await;
    report.fetched = records.len();
    report.invalid = invalid;

    tracing::info!(
        fetched = report.fetched,
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        failed = report.failed,
        invalid = report.invalid,
        dry_run = report.dry_run,
        "Sync finished"
    );
    Ok(report)
}
