//! Reading Event Logger
//!
//! Structured per-message events (received, extracted, replied) emitted on the
//! `reading_events` target so they land in the NDJSON file as one line each.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::{mask_phone, redact_sensitive_data};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReadingEvent {
    Received {
        sender: String,
        image_count: usize,
    },
    Extracted {
        media_key: String,
        value: Option<f64>,
        confidence: f64,
        method: String,
    },
    Replied {
        intent: String,
        value: Option<f64>,
    },
    Failed {
        stage: String,
        error_msg: String,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub message_sid: String,
    pub timestamp: DateTime<Utc>,
    pub event: ReadingEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Builds the redacted entry without emitting it.
    pub fn entry(message_sid: &str, mut event: ReadingEvent) -> EventLogEntry {
        match &mut event {
            ReadingEvent::Received { sender, .. } => {
                *sender = mask_phone(sender);
            }
            ReadingEvent::Failed { error_msg, .. } => {
                *error_msg = redact_sensitive_data(error_msg);
            }
            ReadingEvent::Extracted { .. } | ReadingEvent::Replied { .. } => {}
        }

        EventLogEntry {
            message_sid: message_sid.into(),
            timestamp: Utc::now(),
            event,
        }
    }

    /// Logs a message-processing event, redacting sender and error text.
    pub fn log_event(message_sid: &str, event: ReadingEvent) {
        let entry = Self::entry(message_sid, event);
        let payload = serde_json::to_string(&entry).unwrap_or_default();
        info!(target: "reading_events", event = %payload, "Reading event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_is_masked() {
        let entry = EventLogger::entry(
            "SM1",
            ReadingEvent::Received {
                sender: "whatsapp:+15551234567".into(),
                image_count: 1,
            },
        );
        assert_eq!(
            entry.event,
            ReadingEvent::Received {
                sender: "whatsapp:***4567".into(),
                image_count: 1
            }
        );
    }

    #[test]
    fn serializes_with_type_tag() {
        let entry = EventLogger::entry(
            "SM2",
            ReadingEvent::Replied {
                intent: "accepted".into(),
                value: Some(12345.0),
            },
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["event"]["type"], "replied");
        assert_eq!(json["message_sid"], "SM2");
    }
}
