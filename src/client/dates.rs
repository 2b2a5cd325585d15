use chrono::{DateTime, SecondsFormat};
use serde_json::Value;

/// Date fields travel as ISO-8601 timestamps with millisecond precision in
/// UTC, e.g. `2021-03-04T10:30:00.000Z`. Conversions work on the JSON value
/// so one implementation covers every entity type. An unparseable or null
/// date is dropped rather than sent malformed.

pub(crate) fn convert_dates_to_wire(record: &mut Value, date_fields: &[&str]) {
    let Some(fields) = record.as_object_mut() else {
        return;
    };
    for name in date_fields {
        match fields.get(*name).cloned() {
            Some(Value::String(raw)) => match DateTime::parse_from_rfc3339(&raw) {
                Ok(date) => {
                    let canonical = date.to_rfc3339_opts(SecondsFormat::Millis, true);
                    fields.insert(name.to_string(), Value::String(canonical));
                }
                Err(_) => {
                    fields.remove(*name);
                }
            },
            Some(Value::Null) => {
                fields.remove(*name);
            }
            None => {}
            // A date field holding a non-string is as invalid as a bad string.
            Some(_) => {
                fields.remove(*name);
            }
        }
    }
}

pub(crate) fn convert_dates_from_wire(record: &mut Value, date_fields: &[&str]) {
    let Some(fields) = record.as_object_mut() else {
        return;
    };
    for name in date_fields {
        match fields.get(*name).cloned() {
            Some(Value::String(raw)) => match DateTime::parse_from_rfc3339(&raw) {
                Ok(date) => {
                    let canonical = date.to_rfc3339_opts(SecondsFormat::Millis, true);
                    fields.insert(name.to_string(), Value::String(canonical));
                }
                Err(_) => {
                    fields.remove(*name);
                }
            },
            Some(Value::Null) => {
                fields.remove(*name);
            }
            _ => {}
        }
    }
}

/// List responses get the same treatment, element by element.
pub(crate) fn convert_date_array_from_wire(records: &mut Value, date_fields: &[&str]) {
    if let Some(items) = records.as_array_mut() {
        for record in items {
            convert_dates_from_wire(record, date_fields);
        }
    }
}
