use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::block::ParsedEvent;

/// A deduplicated, structured event ready for downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchedEvent {
    /// Client-local time of the log entry, reported as UTC.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
    pub title: String,
    pub is_request: bool,
    pub document: Value,
}

impl DispatchedEvent {
    pub(crate) fn from_parsed(event: &ParsedEvent, document: Value) -> Self {
        Self {
            timestamp: event.timestamp.assume_utc(),
            sequence_number: event.sequence_number,
            title: event.title.clone(),
            is_request: event.is_request,
            document,
        }
    }

    /// Looks up a value by JSON pointer, e.g. `/authenticateResponse/clientId`.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.document.pointer(pointer)
    }
}
