//! Record schema for original and transformed events

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Opaque content of a single event, usually an object but copied as-is
/// whatever its JSON type.
pub type EventContent = Value;

/// One decoded document from a compressed fragment.
///
/// Wire form: `{"ts": <integer>, "u": <url>, "e": [<event>, ...]}`. A missing
/// or `null` event list decodes as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalRecord {
    /// Event timestamp
    #[serde(rename = "ts")]
    pub timestamp: i64,
    /// Page URL the events were captured on
    #[serde(rename = "u")]
    pub url: String,
    /// Events captured for this page view, in emission order
    #[serde(rename = "e", default, deserialize_with = "events_or_empty")]
    pub events: Vec<EventContent>,
}

fn events_or_empty<'de, D>(deserializer: D) -> Result<Vec<EventContent>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<EventContent>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Structured view of a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlObject {
    /// Host including a non-default port
    pub domain: String,
    /// Path component as parsed (`/` for a bare domain)
    pub path: String,
    /// Flattened query string, last value wins per key
    #[serde(rename = "query_object")]
    pub query_params: BTreeMap<String, String>,
    /// Fragment including the leading `#`, or empty
    pub hash: String,
}

/// One output record; produced per event of an [`OriginalRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedRecord {
    /// Timestamp copied from the original record
    pub timestamp: i64,
    /// Parsed URL of the original record
    pub url_object: UrlObject,
    /// Event content, verbatim
    #[serde(rename = "ec")]
    pub event_content: EventContent,
}
