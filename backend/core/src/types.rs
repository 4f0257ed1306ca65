use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of text recognized by the OCR engine.
///
/// Order within an image is the engine's detection order and is the scan
/// order used by the extraction strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLine {
    pub text: String,
    /// Engine certainty in `[0, 100]`.
    pub confidence: f64,
}

impl DetectedLine {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Which heuristic (or failure) produced an [`ExtractionResult`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    DigitPattern,
    UnitPattern,
    LongestNumber,
    NoText,
    Failed,
    EngineError,
}

impl ExtractionMethod {
    /// Methods that carry a numeric value.
    pub fn yields_value(self) -> bool {
        matches!(
            self,
            Self::DigitPattern | Self::UnitPattern | Self::LongestNumber
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DigitPattern => "digit_pattern",
            Self::UnitPattern => "unit_pattern",
            Self::LongestNumber => "longest_number",
            Self::NoText => "no_text",
            Self::Failed => "failed",
            Self::EngineError => "engine_error",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reading extracted from a single image.
///
/// `value` is present exactly when `method` is one of the value-yielding
/// methods; the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    value: Option<f64>,
    confidence: f64,
    method: ExtractionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ExtractionResult {
    /// A successful extraction. Panics in debug builds if `method` does not
    /// yield a value.
    pub fn found(value: f64, confidence: f64, method: ExtractionMethod) -> Self {
        debug_assert!(method.yields_value(), "{method} cannot carry a value");
        Self {
            value: Some(value),
            confidence,
            method,
            error: None,
        }
    }

    /// No reading: `no_text` or `failed`.
    pub fn empty(method: ExtractionMethod) -> Self {
        debug_assert!(!method.yields_value(), "{method} must carry a value");
        Self {
            value: None,
            confidence: 0.0,
            method,
            error: None,
        }
    }

    /// The OCR engine could not be invoked for this image.
    pub fn engine_error(message: impl Into<String>) -> Self {
        Self {
            value: None,
            confidence: 0.0,
            method: ExtractionMethod::EngineError,
            error: Some(message.into()),
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn method(&self) -> ExtractionMethod {
        self.method
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Per-image OCR outcome within one request.
#[derive(Debug, Clone, Serialize)]
pub struct ImageOcrRecord {
    pub image_ref: StoredMedia,
    pub result: ExtractionResult,
    pub raw_lines: Vec<DetectedLine>,
}

/// The reading chosen across all images of a request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalReading {
    pub value: Option<f64>,
    pub confidence: f64,
}

impl FinalReading {
    pub fn none() -> Self {
        Self {
            value: None,
            confidence: 0.0,
        }
    }
}

/// What the reply to the sender should say.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseIntent {
    HighConfidenceAccepted,
    LowConfidenceNeedsConfirmation,
    Rejected,
    TextOnlyAck,
    EmptyPrompt,
    ConfirmedByUser,
    DeniedByUser,
}

/// A media object that has been persisted by a [`MediaStore`](crate::MediaStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMedia {
    /// Storage key, e.g. `meters/2026/10/SM123_0.jpeg`.
    pub key: String,
    /// Publicly reachable URL for the stored object.
    pub public_url: String,
}

/// One attachment on an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub index: usize,
    pub url: String,
    pub content_type: String,
}

impl MediaAttachment {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// A validated inbound message, built once at the webhook boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender: String,
    pub body: String,
    pub message_sid: String,
    pub meter_number: Option<String>,
    /// Attachments with both a URL and a content type, in arrival order.
    pub media: Vec<MediaAttachment>,
    /// The attachment count the sender's platform declared.
    pub declared_media_count: usize,
}

impl InboundMessage {
    pub fn image_attachments(&self) -> impl Iterator<Item = &MediaAttachment> {
        self.media.iter().filter(|m| m.is_image())
    }

    pub fn has_image(&self) -> bool {
        self.media.iter().any(MediaAttachment::is_image)
    }
}

/// Lifecycle of a persisted reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    Accepted,
    Pending,
    Confirmed,
    Denied,
    Rejected,
    None,
}

impl ReadingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Denied => "denied",
            Self::Rejected => "rejected",
            Self::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accepted" => Some(Self::Accepted),
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "denied" => Some(Self::Denied),
            "rejected" => Some(Self::Rejected),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// Per-image detail kept alongside a persisted reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrDetail {
    pub key: String,
    pub value: Option<f64>,
    pub confidence: f64,
    pub method: ExtractionMethod,
    pub raw_text: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ImageOcrRecord> for OcrDetail {
    fn from(record: &ImageOcrRecord) -> Self {
        Self {
            key: record.image_ref.key.clone(),
            value: record.result.value(),
            confidence: record.result.confidence(),
            method: record.result.method(),
            raw_text: record.raw_lines.iter().map(|l| l.text.clone()).collect(),
            error: record.result.error().map(str::to_string),
        }
    }
}

/// The record written once per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub id: Uuid,
    pub message_sid: String,
    pub sender: String,
    pub message: String,
    pub meter_type: String,
    pub meter_number: Option<String>,
    pub media_urls: Vec<String>,
    pub reading: Option<f64>,
    pub confidence: f64,
    pub ocr_results: Vec<OcrDetail>,
    pub intent: ResponseIntent,
    pub status: ReadingStatus,
    pub timestamp: DateTime<Utc>,
}

/// A low-confidence reading awaiting the sender's yes/no.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub sender: String,
    pub record_id: Uuid,
    pub value: f64,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}
