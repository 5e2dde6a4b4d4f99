//! Per-record transform: one output record per event

use evpack_format::{parse_url, OriginalRecord, Result, TransformedRecord};
use serde::Deserialize;
use serde_json::Value;

/// Expand an original record into one transformed record per event.
///
/// Every output shares the record's timestamp and parsed URL and carries the
/// respective event verbatim, in event order. An empty event list yields an
/// empty vector. The URL is parsed even when there are no events, so a
/// malformed URL always fails the record.
pub fn transform_record(record: &OriginalRecord) -> Result<Vec<TransformedRecord>> {
    let url_object = parse_url(&record.url)?;

    Ok(record
        .events
        .iter()
        .map(|event| TransformedRecord {
            timestamp: record.timestamp,
            url_object: url_object.clone(),
            event_content: event.clone(),
        })
        .collect())
}

/// Decode a JSON value as an original record and transform it.
pub fn transform_value(value: &Value) -> Result<Vec<TransformedRecord>> {
    let record = OriginalRecord::deserialize(value)?;
    transform_record(&record)
}
