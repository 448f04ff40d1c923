// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Notion database schema and property encoding for activities.

use serde_json::{json, Map, Value};

use crate::models::activity::{Activity, DestinationRow, Field};
use crate::time_utils;

/// Property names as constants.
pub mod names {
    pub const NAME: &str = "Name";
    pub const TYPE: &str = "Type";
    /// Distance, km
    pub const LENGTH: &str = "Length";
    /// Moving time, hours
    pub const TIME: &str = "Time";
    /// Watts
    pub const POWER: &str = "Power";
    /// Meters
    pub const ELEVATION: &str = "Elevation";
    pub const DATE: &str = "Date";
    pub const LINK: &str = "Strava Link";
    /// Dedup key
    pub const EXTERNAL_ID: &str = "Strava ID";
}

impl Field {
    /// Destination property backing this field.
    pub fn property_name(self) -> &'static str {
        match self {
            Field::Name => names::NAME,
            Field::Type => names::TYPE,
            Field::Distance => names::LENGTH,
            Field::Duration => names::TIME,
            Field::Date => names::DATE,
            Field::Power => names::POWER,
            Field::Elevation => names::ELEVATION,
            Field::Link => names::LINK,
        }
    }
}

/// Database property definitions written by `init-schema`.
pub fn schema() -> Map<String, Value> {
    let number = json!({ "number": { "format": "number" } });
    let mut schema = Map::new();
    schema.insert(names::NAME.to_string(), json!({ "title": {} }));
    schema.insert(names::TYPE.to_string(), json!({ "select": {} }));
    schema.insert(names::LENGTH.to_string(), number.clone());
    schema.insert(names::TIME.to_string(), number.clone());
    schema.insert(names::POWER.to_string(), number.clone());
    schema.insert(names::ELEVATION.to_string(), number);
    schema.insert(names::DATE.to_string(), json!({ "date": {} }));
    schema.insert(names::LINK.to_string(), json!({ "url": {} }));
    schema.insert(names::EXTERNAL_ID.to_string(), json!({ "rich_text": {} }));
    schema
}

/// All properties of a new row, including the external ID.
pub fn to_properties(activity: &Activity) -> Map<String, Value> {
    let mut props = to_partial_properties(activity, &Field::ALL);
    props.insert(
        names::EXTERNAL_ID.to_string(),
        rich_text(&activity.external_id),
    );
    props
}

/// Only the given properties, for updates.
pub fn to_partial_properties(activity: &Activity, fields: &[Field]) -> Map<String, Value> {
    fields
        .iter()
        .map(|field| {
            let value = match field {
                Field::Name => json!({ "title": [{ "text": { "content": activity.name } }] }),
                Field::Type => json!({ "select": { "name": activity.activity_type } }),
                Field::Distance => json!({ "number": activity.distance_km }),
                Field::Duration => json!({ "number": activity.duration_hours }),
                Field::Date => {
                    json!({ "date": { "start": time_utils::format_local(activity.date) } })
                }
                Field::Power => json!({ "number": activity.average_power }),
                Field::Elevation => json!({ "number": activity.elevation_gain }),
                Field::Link => json!({ "url": activity.source_link }),
            };
            (field.property_name().to_string(), value)
        })
        .collect()
}

/// Parse a Notion page object back into a destination row.
///
/// Missing or mistyped properties become `None` rather than errors, since
/// rows may have been edited by hand.
pub fn row_from_page(page: &Value) -> Option<DestinationRow> {
    let row_id = page.get("id")?.as_str()?.to_string();
    let props = page.get("properties").and_then(Value::as_object);
    let prop = |name: &str| props.and_then(|p| p.get(name));

    Some(DestinationRow {
        row_id,
        external_id: prop(names::EXTERNAL_ID)
            .and_then(|p| plain_text(p, "rich_text"))
            .filter(|s| !s.is_empty()),
        name: prop(names::NAME)
            .and_then(|p| plain_text(p, "title"))
            .unwrap_or_default(),
        activity_type: prop(names::TYPE)
            .and_then(|p| p.pointer("/select/name"))
            .and_then(Value::as_str)
            .map(str::to_string),
        distance_km: prop(names::LENGTH).and_then(number),
        duration_hours: prop(names::TIME).and_then(number),
        date: prop(names::DATE)
            .and_then(|p| p.pointer("/date/start"))
            .and_then(Value::as_str)
            .and_then(time_utils::parse_notion_date),
        average_power: prop(names::POWER).and_then(number),
        elevation_gain: prop(names::ELEVATION).and_then(number),
        source_link: prop(names::LINK)
            .and_then(|p| p.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn rich_text(content: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": content } }] })
}

/// Concatenate the text segments of a title or rich_text property.
fn plain_text(prop: &Value, kind: &str) -> Option<String> {
    let segments = prop.get(kind)?.as_array()?;
    Some(
        segments
            .iter()
            .filter_map(|seg| {
                seg.get("plain_text")
                    .or_else(|| seg.pointer("/text/content"))
                    .and_then(Value::as_str)
            })
            .collect(),
    )
}

fn number(prop: &Value) -> Option<f64> {
    prop.get("number").and_then(Value::as_f64)
}
