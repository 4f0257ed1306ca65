//! Telemetry and structured logging components for Meterline.
//!
//! Handles log redaction, JSON output generation, file rotation, and
//! per-message reading events.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger, ReadingEvent};
pub use logger::init_logger;
pub use redact::{mask_phone, redact_sensitive_data};
