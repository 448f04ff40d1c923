// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and parsing.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// Overlap subtracted from the incremental cursor.
///
/// Activity dates are stored as local wall-clock time but Strava's `after`
/// filter is a UTC epoch, so the cursor is pulled back a day to cover any
/// timezone offset. Re-fetched activities are unchanged and skipped.
const CURSOR_OVERLAP_HOURS: i64 = 24;

/// Format a local start time the way it is written to Notion date properties.
pub fn format_local(date: NaiveDateTime) -> String {
    date.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Parse a Strava `start_date_local` value (`2024-01-01T07:00:00Z`).
///
/// Strava marks local times with a `Z` even though they carry no offset,
/// so the suffix is ignored.
pub fn parse_strava_local(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Parse a Notion date `start` value.
///
/// Notion returns either a bare date, a naive datetime, or a datetime with
/// an offset. The wall-clock part is kept in every case.
pub fn parse_notion_date(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Turn the most recent synced activity date into a Strava `after` cursor.
pub fn incremental_cursor(most_recent: NaiveDateTime) -> DateTime<Utc> {
    (most_recent - Duration::hours(CURSOR_OVERLAP_HOURS)).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_parse_strava_local_ignores_z() {
        assert_eq!(
            parse_strava_local("2024-01-01T07:30:00Z"),
            Some(dt("2024-01-01 07:30:00"))
        );
        assert_eq!(parse_strava_local("yesterday"), None);
    }

    #[test]
    fn test_parse_notion_date_formats() {
        let expected = dt("2024-01-01 07:30:00");
        assert_eq!(parse_notion_date("2024-01-01T07:30:00.000+00:00"), Some(expected));
        assert_eq!(parse_notion_date("2024-01-01T07:30:00.000-08:00"), Some(expected));
        assert_eq!(parse_notion_date("2024-01-01T07:30:00"), Some(expected));
        assert_eq!(parse_notion_date("2024-01-01"), Some(dt("2024-01-01 00:00:00")));
        assert_eq!(parse_notion_date("01/01/2024"), None);
    }

    #[test]
    fn test_format_local_round_trips_through_notion_parser() {
        let date = dt("2023-06-15 18:05:09");
        assert_eq!(format_local(date), "2023-06-15T18:05:09");
        assert_eq!(parse_notion_date(&format_local(date)), Some(date));
    }

    #[test]
    fn test_incremental_cursor_overlaps_one_day() {
        let cursor = incremental_cursor(dt("2024-03-10 08:00:00"));
        assert_eq!(cursor.to_rfc3339(), "2024-03-09T08:00:00+00:00");
    }
}
