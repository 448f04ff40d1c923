// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava-Notion Sync: mirror Strava activities into a Notion database
//!
//! This crate fetches activities from Strava, normalizes them, and upserts
//! them as rows of a Notion database, deduplicating by Strava activity ID.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;
