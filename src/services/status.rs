// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database statistics for the `status` command.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::models::DestinationRow;
use crate::services::notion::NotionClient;
use crate::services::store::ActivityStore;

/// Label for rows without a type.
const UNKNOWN_TYPE: &str = "Unknown";

/// Snapshot of the destination database.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseStatus {
    pub title: String,
    pub total: usize,
    pub most_recent: Option<NaiveDateTime>,
    /// Row count per activity type, most common first
    pub by_type: Vec<(String, usize)>,
}

impl DatabaseStatus {
    /// Summarize rows already loaded from the store.
    pub fn from_rows(title: String, rows: &[DestinationRow]) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for row in rows {
            let activity_type = row.activity_type.as_deref().unwrap_or(UNKNOWN_TYPE);
            *counts.entry(activity_type).or_insert(0) += 1;
        }

        let mut by_type: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(t, n)| (t.to_string(), n))
            .collect();
        // Ties broken by name so output is stable
        by_type.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            title,
            total: rows.len(),
            most_recent: rows.iter().filter_map(|r| r.date).max(),
            by_type,
        }
    }

    /// Load the status of the configured database.
    pub async fn load(client: &NotionClient) -> Result<Self> {
        let title = client.database_title().await?;
        let rows = client.query_all().await?;
        Ok(Self::from_rows(title, &rows))
    }
}
