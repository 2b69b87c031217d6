//! Row helpers
//!
//! Rows travel as JSON objects. The key field and the last-modified marker are
//! looked up by name so callers can point them at whatever their tables use.

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};

/// A row as a JSON object
pub type Row = Map<String, Value>;

/// Read a row's identifier as a string.
///
/// String and integer ids are accepted; anything else is treated as missing.
pub fn row_id(row: &Row, id_field: &str) -> Option<String> {
    match row.get(id_field)? {
        Value::String(id) => {
            let id = id.trim();
            (!id.is_empty()).then(|| id.to_string())
        }
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Read a row's last-modified marker as Unix milliseconds.
///
/// Integers are taken as milliseconds. Strings are parsed as RFC 3339, then as
/// a `YYYY-MM-DD HH:MM:SS` UTC timestamp, then as a plain integer.
pub fn modified_marker(row: &Row, modified_field: &str) -> Option<i64> {
    match row.get(modified_field)? {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|value| value.is_finite())
                .map(float_millis)
        }),
        Value::String(text) => parse_timestamp(text),
        _ => None,
    }
}

// Saturates outside the i64 range
#[allow(clippy::cast_possible_truncation)]
fn float_millis(value: f64) -> i64 {
    value.round() as i64
}

fn parse_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(parsed.and_utc().timestamp_millis());
    }
    text.parse::<i64>().ok()
}

/// Whether the remote row was modified after the baseline snapshot.
///
/// Returns `false` when either side lacks a usable marker.
pub fn is_remote_newer(remote: &Row, baseline: &Row, modified_field: &str) -> bool {
    match (
        modified_marker(remote, modified_field),
        modified_marker(baseline, modified_field),
    ) {
        (Some(remote_marker), Some(baseline_marker)) => remote_marker > baseline_marker,
        _ => false,
    }
}

/// Convert an arbitrary JSON value into a row, rejecting non-objects.
pub fn into_row(value: Value) -> Option<Row> {
    match value {
        Value::Object(row) => Some(row),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        into_row(value).unwrap()
    }

    #[test]
    fn row_id_accepts_strings_and_numbers() {
        assert_eq!(row_id(&row(json!({"id": "o1"})), "id").as_deref(), Some("o1"));
        assert_eq!(row_id(&row(json!({"id": 42})), "id").as_deref(), Some("42"));
        assert_eq!(row_id(&row(json!({"id": "  "})), "id"), None);
        assert_eq!(row_id(&row(json!({"id": null})), "id"), None);
        assert_eq!(row_id(&row(json!({"uuid": "x"})), "id"), None);
    }

    #[test]
    fn modified_marker_rounds_fractional_numbers() {
        assert_eq!(
            modified_marker(&row(json!({"updated_at": 1500.6})), "updated_at"),
            Some(1501)
        );
        assert_eq!(
            modified_marker(&row(json!({"updated_at": 1e300})), "updated_at"),
            Some(i64::MAX)
        );
    }

    #[test]
    fn modified_marker_parses_supported_formats() {
        assert_eq!(
            modified_marker(&row(json!({"updated_at": 100})), "updated_at"),
            Some(100)
        );
        assert_eq!(
            modified_marker(
                &row(json!({"updated_at": "1970-01-01T00:00:01Z"})),
                "updated_at"
            ),
            Some(1000)
        );
        assert_eq!(
            modified_marker(
                &row(json!({"updated_at": "1970-01-01 00:00:02"})),
                "updated_at"
            ),
            Some(2000)
        );
        assert_eq!(
            modified_marker(&row(json!({"updated_at": "yesterday"})), "updated_at"),
            None
        );
    }

    #[test]
    fn remote_newer_requires_both_markers() {
        let remote = row(json!({"id": "o1", "updated_at": 200}));
        let older = row(json!({"id": "o1", "updated_at": 100}));
        let same = row(json!({"id": "o1", "updated_at": 200}));
        let unmarked = row(json!({"id": "o1"}));

        assert!(is_remote_newer(&remote, &older, "updated_at"));
        assert!(!is_remote_newer(&remote, &same, "updated_at"));
        assert!(!is_remote_newer(&remote, &unmarked, "updated_at"));
        assert!(!is_remote_newer(&unmarked, &older, "updated_at"));
    }

    #[test]
    fn into_row_rejects_non_objects() {
        assert!(into_row(json!([1, 2])).is_none());
        assert!(into_row(json!("text")).is_none());
        assert!(into_row(json!({"a": 1})).is_some());
    }
}
