// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Destination store abstraction.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Activity, DestinationRow, Field};

/// Operations the sync needs from the destination database.
///
/// Implemented by [`crate::services::NotionClient`]; tests use an
/// in-memory store.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Every row currently in the store.
    async fn query_all(&self) -> Result<Vec<DestinationRow>>;

    /// Create a row for `activity`, returning the new row ID.
    async fn create_row(&self, activity: &Activity) -> Result<String>;

    /// Overwrite the given fields of an existing row.
    async fn update_row(&self, row_id: &str, activity: &Activity, fields: &[Field]) -> Result<()>;
}
