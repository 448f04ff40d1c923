// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Normalized activity model and the Strava record mapper.

use chrono::NaiveDateTime;
use serde_json::Value;
use validator::Validate;

use crate::error::{Result, SyncError};
use crate::services::strava::StravaActivitySummary;
use crate::time_utils;

/// Tolerance for comparing stored measures against freshly mapped ones.
const MEASURE_EPSILON: f64 = 1e-6;

/// One activity, normalized from a provider record.
///
/// Never mutated after mapping; discarded at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    /// Strava activity ID, the dedup key
    pub external_id: String,
    pub name: String,
    /// Activity type (Run, Ride, Swim, ...)
    pub activity_type: String,
    /// Distance in kilometers, 2 decimals
    pub distance_km: f64,
    /// Moving time in hours, 2 decimals
    pub duration_hours: f64,
    /// Local wall-clock start time
    pub date: NaiveDateTime,
    /// Weighted average power in watts
    pub average_power: Option<f64>,
    /// Total elevation gain in meters
    pub elevation_gain: Option<f64>,
    /// Link to the activity on Strava
    pub source_link: String,
}

/// A row already present in the destination database.
///
/// Fields are optional because rows may have been edited by hand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DestinationRow {
    /// Destination page ID
    pub row_id: String,
    pub external_id: Option<String>,
    pub name: String,
    pub activity_type: Option<String>,
    pub distance_km: Option<f64>,
    pub duration_hours: Option<f64>,
    pub date: Option<NaiveDateTime>,
    pub average_power: Option<f64>,
    pub elevation_gain: Option<f64>,
    pub source_link: Option<String>,
}

/// Synced fields, one per destination property (the external ID excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Type,
    Distance,
    Duration,
    Date,
    Power,
    Elevation,
    Link,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Name,
        Field::Type,
        Field::Distance,
        Field::Duration,
        Field::Date,
        Field::Power,
        Field::Elevation,
        Field::Link,
    ];
}

impl Activity {
    /// Map a raw Strava record into an activity.
    ///
    /// Fails with [`SyncError::Validation`] when the record does not match the
    /// expected shape or a required field is missing or malformed.
    pub fn from_strava(raw: &Value) -> Result<Self> {
        let external_id = raw
            .get("id")
            .filter(|id| !id.is_null())
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());

        let summary: StravaActivitySummary =
            serde_json::from_value(raw.clone()).map_err(|e| SyncError::Validation {
                external_id: external_id.clone(),
                reason: e.to_string(),
            })?;

        Self::try_from(summary)
    }

    /// Fields whose values differ from the stored row.
    pub fn diff(&self, row: &DestinationRow) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|field| !self.matches(row, *field))
            .collect()
    }

    fn matches(&self, row: &DestinationRow, field: Field) -> bool {
        match field {
            Field::Name => self.name == row.name,
            Field::Type => row.activity_type.as_deref() == Some(self.activity_type.as_str()),
            Field::Distance => same_measure(Some(self.distance_km), row.distance_km),
            Field::Duration => same_measure(Some(self.duration_hours), row.duration_hours),
            Field::Date => row.date == Some(self.date),
            Field::Power => same_measure(self.average_power, row.average_power),
            Field::Elevation => same_measure(self.elevation_gain, row.elevation_gain),
            Field::Link => row.source_link.as_deref() == Some(self.source_link.as_str()),
        }
    }
}

impl DestinationRow {
    /// The row as it looks after writing `activity` to it.
    pub fn from_activity(row_id: String, activity: &Activity) -> Self {
        Self {
            row_id,
            external_id: Some(activity.external_id.clone()),
            name: activity.name.clone(),
            activity_type: Some(activity.activity_type.clone()),
            distance_km: Some(activity.distance_km),
            duration_hours: Some(activity.duration_hours),
            date: Some(activity.date),
            average_power: activity.average_power,
            elevation_gain: activity.elevation_gain,
            source_link: Some(activity.source_link.clone()),
        }
    }
}

impl TryFrom<StravaActivitySummary> for Activity {
    type Error = SyncError;

    fn try_from(summary: StravaActivitySummary) -> Result<Self> {
        let external_id = summary
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        let invalid = |reason: String| SyncError::Validation {
            external_id: external_id.clone(),
            reason,
        };

        summary.validate().map_err(|e| invalid(e.to_string()))?;

        // validate() guarantees these are present
        let (Some(id), Some(name), Some(start)) = (
            summary.id,
            summary.name,
            summary.start_date_local.as_deref(),
        ) else {
            return Err(invalid("missing required field".to_string()));
        };

        let activity_type = summary
            .activity_type
            .or(summary.sport_type)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| invalid("missing activity type".to_string()))?;

        let date = time_utils::parse_strava_local(start)
            .ok_or_else(|| invalid(format!("unparsable start_date_local {:?}", start)))?;

        let moving_seconds = summary.moving_time.unwrap_or(0) as f64;

        Ok(Self {
            external_id: id.to_string(),
            name,
            activity_type,
            distance_km: round2(summary.distance.unwrap_or(0.0) / 1000.0),
            duration_hours: round2(moving_seconds / 3600.0),
            date,
            average_power: summary.weighted_average_watts.or(summary.average_watts),
            elevation_gain: summary.total_elevation_gain,
            source_link: strava_url(id),
        })
    }
}

/// Public URL of an activity on Strava.
pub fn strava_url(id: u64) -> String {
    format!("https://www.strava.com/activities/{}", id)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn same_measure(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() < MEASURE_EPSILON,
        (None, None) => true,
        _ => false,
    }
}
