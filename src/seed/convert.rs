//! JSON to BSON conversion for seed files and view pipelines.
//!
//! Plain JSON maps onto BSON directly. Two single-key objects are markers:
//! - `{"$date": "2024-01-15"}` or an RFC 3339 string or epoch milliseconds
//! - `{"$now": <offset seconds>}`, the bootstrap time shifted by the offset

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use mongodb::bson::{self, Bson, Document};
use serde_json::Value;

/// Errors converting JSON values to BSON.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Invalid $date value {0}: expected RFC 3339, YYYY-MM-DD or epoch milliseconds")]
    InvalidDate(String),

    #[error("Invalid $now value {0}: expected an offset in seconds")]
    InvalidNow(String),

    #[error("Integer {0} does not fit in a 64-bit signed integer")]
    IntegerOutOfRange(String),

    #[error("Expected a JSON object, found {0}")]
    NotAnObject(String),
}

/// Convert one JSON value.
pub fn to_bson(value: &Value, now: DateTime<Utc>) -> Result<Bson, ConvertError> {
    Ok(match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i32::try_from(i)
                .map(Bson::Int32)
                .unwrap_or(Bson::Int64(i)),
            (None, Some(f)) if n.is_f64() => Bson::Double(f),
            _ => return Err(ConvertError::IntegerOutOfRange(n.to_string())),
        },
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(
            items
                .iter()
                .map(|item| to_bson(item, now))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(date) = map.get("$date") {
                    return parse_date(date).map(Bson::DateTime);
                }
                if let Some(offset) = map.get("$now") {
                    return shift_now(offset, now).map(Bson::DateTime);
                }
            }

            let mut document = Document::new();
            for (key, item) in map {
                document.insert(key.clone(), to_bson(item, now)?);
            }
            Bson::Document(document)
        }
    })
}

/// Convert a JSON object to a document.
pub fn to_document(value: &Value, now: DateTime<Utc>) -> Result<Document, ConvertError> {
    match to_bson(value, now)? {
        Bson::Document(document) => Ok(document),
        _ => Err(ConvertError::NotAnObject(value.to_string())),
    }
}

fn parse_date(value: &Value) -> Result<bson::DateTime, ConvertError> {
    let invalid = || ConvertError::InvalidDate(value.to_string());

    match value {
        Value::String(s) => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                return Ok(bson::DateTime::from_millis(parsed.timestamp_millis()));
            }
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| invalid())?;
            let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
            Ok(bson::DateTime::from_millis(
                Utc.from_utc_datetime(&midnight).timestamp_millis(),
            ))
        }
        Value::Number(n) => n
            .as_i64()
            .map(bson::DateTime::from_millis)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn shift_now(offset: &Value, now: DateTime<Utc>) -> Result<bson::DateTime, ConvertError> {
    let seconds = offset
        .as_i64()
        .ok_or_else(|| ConvertError::InvalidNow(offset.to_string()))?;

    let millis = now
        .timestamp_millis()
        .saturating_add(seconds.saturating_mul(1000));
    Ok(bson::DateTime::from_millis(millis))
}
