//! Mapping of remote JSON items to domain objects
//!
//! Listing and move responses describe entries with loosely typed fields:
//! ids may be numbers or strings, names may be `name` or `filename`, and
//! folders and files report their timestamp under different keys.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use czkdrive_core::domain::RemoteObject;
use serde_json::Value;
use tracing::debug;

/// Layout of the server's plain timestamps (interpreted as UTC)
pub const SERVER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ID_FIELDS: &[&str] = &["id", "file_id", "folder_id"];
const NAME_FIELDS: &[&str] = &["name", "filename"];
const FOLDER_TIME_FIELDS: &[&str] = &["created_at", "updated_at", "modified"];
const FILE_TIME_FIELDS: &[&str] = &["uploaded_at", "updated_at", "modified"];

/// Renders an id value as text
///
/// Numbers are rendered without a fractional part; strings are used as-is.
pub fn render_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Some(v.to_string())
            } else if let Some(v) = n.as_i64() {
                Some(v.to_string())
            } else {
                n.as_f64().map(|v| format!("{v:.0}"))
            }
        }
        _ => None,
    }
}

/// First renderable id among `fields` of `node`
pub fn extract_id(node: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|field| node.get(*field).and_then(render_id))
}

/// Parses an RFC 3339 or `YYYY-MM-DD HH:MM:SS` timestamp
pub fn try_parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, SERVER_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Like [`try_parse_timestamp`], falling back to the current time
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    try_parse_timestamp(raw).unwrap_or_else(|| {
        if !raw.is_empty() {
            debug!(raw = %raw, "Unparseable timestamp, using current time");
        }
        Utc::now()
    })
}

fn is_folder(item: &Value) -> bool {
    item.get("is_folder")
        .and_then(Value::as_bool)
        .unwrap_or(false)
        || item.get("type").and_then(Value::as_str) == Some("folder")
}

fn first_str<'a>(item: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .find_map(|field| item.get(*field).and_then(Value::as_str))
}

fn size_of(item: &Value) -> u64 {
    match item.get("size") {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v > 0.0).map(|v| v as u64))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Converts a listing entry into a [`RemoteObject`]
///
/// Returns `None` when the entry is not a JSON object.
pub fn map_item(item: &Value) -> Option<RemoteObject> {
    if !item.is_object() {
        return None;
    }

    let id = extract_id(item, ID_FIELDS).unwrap_or_default();
    let name = first_str(item, NAME_FIELDS).unwrap_or_default();

    if is_folder(item) {
        let modified = parse_timestamp(first_str(item, FOLDER_TIME_FIELDS).unwrap_or_default());
        Some(RemoteObject::folder(id, name, modified))
    } else {
        let modified = parse_timestamp(first_str(item, FILE_TIME_FIELDS).unwrap_or_default());
        Some(RemoteObject::file(id, name, size_of(item), modified))
    }
}

/// Maps every object in a JSON array, skipping anything else
pub fn map_items(items: &Value) -> Vec<RemoteObject> {
    items
        .as_array()
        .map(|items| items.iter().filter_map(map_item).collect())
        .unwrap_or_default()
}
