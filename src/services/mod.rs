// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod http;
pub mod index;
pub mod notion;
pub mod status;
pub mod store;
pub mod strava;
pub mod sync;

pub use index::DestinationIndex;
pub use notion::NotionClient;
pub use status::DatabaseStatus;
pub use store::ActivityStore;
pub use strava::{StravaClient, StravaService};
pub use sync::{run_sync, Outcome, Progress, SyncEvent, SyncOptions, SyncReport, UpsertEngine};
