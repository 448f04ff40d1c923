// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dedup index of existing destination rows, keyed by external ID.
//!
//! Rebuilt from a full scan at the start of every run. Only reflects the
//! store as of that scan plus the writes of the current run.

use chrono::NaiveDateTime;
use dashmap::DashMap;

use crate::error::Result;
use crate::models::DestinationRow;
use crate::services::store::ActivityStore;

/// Mapping from external ID to the destination row holding it.
#[derive(Debug, Default)]
pub struct DestinationIndex {
    rows: DashMap<String, DestinationRow>,
    total_rows: usize,
    most_recent: Option<NaiveDateTime>,
}

impl DestinationIndex {
    /// Scan the store and build the index.
    pub async fn load<S: ActivityStore + ?Sized>(store: &S) -> Result<Self> {
        let rows = store.query_all().await?;
        let index = Self::from_rows(rows);
        tracing::info!(
            indexed = index.len(),
            total = index.total_rows(),
            most_recent = ?index.most_recent(),
            "Built destination index"
        );
        Ok(index)
    }

    /// Build the index from already-loaded rows.
    ///
    /// Rows without an external ID are counted but not indexed. If the store
    /// already holds duplicates, the first row wins.
    pub fn from_rows(rows: Vec<DestinationRow>) -> Self {
        let total_rows = rows.len();
        let most_recent = rows.iter().filter_map(|r| r.date).max();
        let index = DashMap::with_capacity(total_rows);

        for row in rows {
            let Some(external_id) = row.external_id.clone() else {
                continue;
            };
            if let Some(existing) = index.get(&external_id) {
                let existing: &DestinationRow = &existing;
                tracing::warn!(
                    external_id = %external_id,
                    kept = %existing.row_id,
                    ignored = %row.row_id,
                    "Duplicate external ID already in destination"
                );
                continue;
            }
            index.insert(external_id, row);
        }

        Self {
            rows: index,
            total_rows,
            most_recent,
        }
    }

    /// Snapshot of the row for `external_id`.
    pub fn get(&self, external_id: &str) -> Option<DestinationRow> {
        self.rows.get(external_id).map(|r| r.value().clone())
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.rows.contains_key(external_id)
    }

    /// Record the current state of a row after a write.
    pub fn insert(&self, external_id: String, row: DestinationRow) {
        self.rows.insert(external_id, row);
    }

    /// Number of indexed external IDs.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows seen in the scan, indexed or not.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Latest activity date seen in the scan.
    pub fn most_recent(&self) -> Option<NaiveDateTime> {
        self.most_recent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(row_id: &str, external_id: Option<&str>, day: u32) -> DestinationRow {
        DestinationRow {
            row_id: row_id.to_string(),
            external_id: external_id.map(str::to_string),
            date: NaiveDate::from_ymd_opt(2024, 1, day).and_then(|d| d.and_hms_opt(9, 0, 0)),
            ..Default::default()
        }
    }

    #[test]
    fn test_indexes_by_external_id() {
        let index = DestinationIndex::from_rows(vec![
            row("p1", Some("1"), 1),
            row("p2", Some("2"), 5),
            row("p3", None, 9),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.total_rows(), 3);
        assert_eq!(index.get("2").map(|r| r.row_id), Some("p2".to_string()));
        assert!(!index.contains("3"));
        // Unindexed rows still count toward the cursor
        assert_eq!(
            index.most_recent(),
            NaiveDate::from_ymd_opt(2024, 1, 9).and_then(|d| d.and_hms_opt(9, 0, 0))
        );
    }

    #[test]
    fn test_first_duplicate_wins() {
        let index =
            DestinationIndex::from_rows(vec![row("p1", Some("1"), 1), row("p2", Some("1"), 2)]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("1").map(|r| r.row_id), Some("p1".to_string()));
    }

    #[test]
    fn test_empty_store() {
        let index = DestinationIndex::from_rows(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.most_recent(), None);
    }
}
