// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use strava_notion_sync::error::{Result, Service, SyncError};
use strava_notion_sync::models::{Activity, DestinationRow, Field};
use strava_notion_sync::services::ActivityStore;

/// A write issued against the in-memory store.
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub enum Write {
    Create { external_id: String },
    Update { row_id: String, fields: Vec<Field> },
}

/// In-memory destination store that records every write.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<DestinationRow>>,
    writes: Mutex<Vec<Write>>,
    failing: Mutex<HashSet<String>>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<DestinationRow>) -> Self {
        let store = Self::default();
        *store.rows.lock().unwrap() = rows;
        store
    }

    /// Make every write for `external_id` fail.
    pub fn fail_writes_for(&self, external_id: &str) {
        self.failing.lock().unwrap().insert(external_id.to_string());
    }

    pub fn rows(&self) -> Vec<DestinationRow> {
        self.rows.lock().unwrap().clone()
    }

    pub fn rows_for(&self, external_id: &str) -> Vec<DestinationRow> {
        self.rows()
            .into_iter()
            .filter(|r| r.external_id.as_deref() == Some(external_id))
            .collect()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    fn check_failing(&self, external_id: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(external_id) {
            return Err(SyncError::Remote {
                service: Service::Notion,
                status: Some(400),
                message: "validation_error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn query_all(&self) -> Result<Vec<DestinationRow>> {
        Ok(self.rows())
    }

    async fn create_row(&self, activity: &Activity) -> Result<String> {
        self.check_failing(&activity.external_id)?;
        let mut rows = self.rows.lock().unwrap();
        let row_id = format!("page-{}", rows.len() + 1);
        rows.push(DestinationRow::from_activity(row_id.clone(), activity));
        self.writes.lock().unwrap().push(Write::Create {
            external_id: activity.external_id.clone(),
        });
        Ok(row_id)
    }

    async fn update_row(&self, row_id: &str, activity: &Activity, fields: &[Field]) -> Result<()> {
        self.check_failing(&activity.external_id)?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.row_id == row_id)
            .ok_or_else(|| SyncError::Remote {
                service: Service::Notion,
                status: Some(404),
                message: format!("no row {}", row_id),
            })?;
        // Apply only the requested fields
        let updated = DestinationRow::from_activity(row_id.to_string(), activity);
        for field in fields {
            match field {
                Field::Name => row.name = updated.name.clone(),
                Field::Type => row.activity_type = updated.activity_type.clone(),
                Field::Distance => row.distance_km = updated.distance_km,
                Field::Duration => row.duration_hours = updated.duration_hours,
                Field::Date => row.date = updated.date,
                Field::Power => row.average_power = updated.average_power,
                Field::Elevation => row.elevation_gain = updated.elevation_gain,
                Field::Link => row.source_link = updated.source_link.clone(),
            }
        }
        self.writes.lock().unwrap().push(Write::Update {
            row_id: row_id.to_string(),
            fields: fields.to_vec(),
        });
        Ok(())
    }
}

/// A raw Strava summary record.
#[allow(dead_code)]
pub fn strava_record(id: u64, name: &str, distance_m: f64, start_date_local: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "type": "Run",
        "sport_type": "Run",
        "start_date_local": start_date_local,
        "start_date": start_date_local,
        "distance": distance_m,
        "moving_time": 1800,
        "total_elevation_gain": 35.0,
        "weighted_average_watts": null
    })
}

/// A mapped activity built from [`strava_record`].
#[allow(dead_code)]
pub fn activity(id: u64, name: &str, distance_m: f64) -> Activity {
    Activity::from_strava(&strava_record(id, name, distance_m, "2024-01-01T07:00:00Z"))
        .expect("fixture should map")
}
