//! Per-message reading pipeline.
//!
//! One inbound message runs through a single sequential flow: handshake
//! interception, then for each image attachment in arrival order download,
//! store, and detect text, then select, classify, and persist.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use logging::{EventLogger, ReadingEvent};
use meterline_config::ThresholdConfig;
use meterline_core::{
    retry_with, DetectedLine, ExtractionResult, FinalReading, ImageOcrRecord, InboundMessage,
    MediaAttachment, MediaFetcher, MediaStore, OcrDetail, PendingConfirmation, ReadingRecord,
    ReadingRepository, ResponseIntent, RetryError, RetryPolicy, Sleeper, StoredMedia,
    TextDetector, TokioSleeper,
};
use meterline_understanding::{extract_reading, select_reading};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::classifier::{classify, handshake_intent, status_for};

/// Policy knobs for [`ReadingPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub thresholds: ThresholdConfig,
    pub retry: RetryPolicy,
    /// First segment of every storage key.
    pub key_prefix: String,
    /// Recorded on every persisted reading.
    pub meter_type: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            thresholds: ThresholdConfig::default(),
            retry: RetryPolicy::default(),
            key_prefix: "meters".to_string(),
            meter_type: "electricity".to_string(),
        }
    }
}

/// What the pipeline decided for one message.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub intent: ResponseIntent,
    pub reading: FinalReading,
    /// Images stored for this message, in arrival order.
    pub media: Vec<StoredMedia>,
    /// The pending reading a yes/no reply resolved, if there was one.
    pub resolved: Option<PendingConfirmation>,
    /// Id of the record persisted for this message.
    pub record_id: Option<Uuid>,
}

impl Outcome {
    fn handshake(intent: ResponseIntent, resolved: Option<PendingConfirmation>) -> Self {
        Self {
            intent,
            reading: FinalReading::none(),
            media: Vec::new(),
            resolved,
            record_id: None,
        }
    }
}

/// The reading pipeline with its injected collaborators.
pub struct ReadingPipeline {
    detector: Arc<dyn TextDetector>,
    media: Arc<dyn MediaStore>,
    fetcher: Arc<dyn MediaFetcher>,
    repository: Arc<dyn ReadingRepository>,
    sleeper: Arc<dyn Sleeper>,
    settings: PipelineSettings,
}

impl ReadingPipeline {
    pub fn new(
        detector: Arc<dyn TextDetector>,
        media: Arc<dyn MediaStore>,
        fetcher: Arc<dyn MediaFetcher>,
        repository: Arc<dyn ReadingRepository>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            detector,
            media,
            fetcher,
            repository,
            sleeper: Arc::new(TokioSleeper),
            settings,
        }
    }

    /// Replace the backoff sleeper.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Run one inbound message to a decision. Never fails: collaborator
    /// errors degrade the outcome instead.
    #[instrument(skip(self, message), fields(message_sid = %message.message_sid))]
    pub async fn handle(&self, message: &InboundMessage) -> Outcome {
        EventLogger::log_event(
            &message.message_sid,
            ReadingEvent::Received {
                sender: message.sender.clone(),
                image_count: message.image_attachments().count(),
            },
        );

        if let Some(intent) = handshake_intent(&message.body) {
            let resolved = self.resolve_handshake(&message.sender, intent).await;
            self.log_reply(message, intent, resolved.as_ref().map(|p| p.value));
            return Outcome::handshake(intent, resolved);
        }

        // A confirmation only answers the message right after it.
        self.discard_stale_confirmation(&message.sender).await;

        let mut records = Vec::new();
        for attachment in &message.media {
            if !attachment.is_image() {
                info!(
                    index = attachment.index,
                    content_type = %attachment.content_type,
                    "Skipping non-image media"
                );
                continue;
            }
            if let Some(record) = self.process_image(message, attachment).await {
                records.push(record);
            }
        }

        let reading = select_reading(&records);
        let intent = classify(
            &reading,
            message.has_image(),
            &message.body,
            &self.settings.thresholds,
        );
        info!(
            value = ?reading.value,
            confidence = reading.confidence,
            images = records.len(),
            intent = ?intent,
            "Classified message"
        );

        let record = self.build_record(message, &records, &reading, intent);
        let record_id = record.id;
        let saved = self.persist(&record).await;

        if saved && intent == ResponseIntent::LowConfidenceNeedsConfirmation {
            if let Some(value) = reading.value {
                self.arm(&message.sender, record_id, value, reading.confidence)
                    .await;
            }
        }

        self.log_reply(message, intent, reading.value);
        Outcome {
            intent,
            reading,
            media: records.into_iter().map(|r| r.image_ref).collect(),
            resolved: None,
            record_id: Some(record_id),
        }
    }

    /// Download, store, and read one image. `None` when the image was skipped.
    async fn process_image(
        &self,
        message: &InboundMessage,
        attachment: &MediaAttachment,
    ) -> Option<ImageOcrRecord> {
        let bytes = match download_media(
            self.fetcher.as_ref(),
            &self.settings.retry,
            self.sleeper.as_ref(),
            &attachment.url,
        )
        .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(index = attachment.index, error = %e, "Failed to download media");
                self.log_failure(message, "download", &e.to_string());
                return None;
            }
        };

        let key = media::storage_key(
            &self.settings.key_prefix,
            Utc::now(),
            &message.message_sid,
            attachment.index,
            &attachment.content_type,
        );
        let stored = match upload_media(
            self.media.as_ref(),
            &self.settings.retry,
            self.sleeper.as_ref(),
            &key,
            bytes,
            &attachment.content_type,
        )
        .await
        {
            Ok(stored) => stored,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to store media");
                self.log_failure(message, "upload", &e.to_string());
                return None;
            }
        };
        info!(url = %stored.public_url, "Media available");

        let (result, raw_lines) = read_image(self.detector.as_ref(), &stored).await;
        EventLogger::log_event(
            &message.message_sid,
            ReadingEvent::Extracted {
                media_key: stored.key.clone(),
                value: result.value(),
                confidence: result.confidence(),
                method: result.method().to_string(),
            },
        );
        Some(ImageOcrRecord {
            image_ref: stored,
            result,
            raw_lines,
        })
    }

    async fn resolve_handshake(
        &self,
        sender: &str,
        intent: ResponseIntent,
    ) -> Option<PendingConfirmation> {
        let pending = match self.repository.take_confirmation(sender).await {
            Ok(Some(pending)) => pending,
            Ok(None) => {
                debug!("Handshake reply with nothing pending");
                return None;
            }
            Err(e) => {
                error!(error = %e, "Failed to look up pending confirmation");
                return None;
            }
        };

        let status = status_for(intent);
        if let Err(e) = self.repository.set_status(pending.record_id, status).await {
            error!(record_id = %pending.record_id, error = %e, "Failed to update reading status");
        } else {
            info!(record_id = %pending.record_id, status = status.as_str(), "Resolved pending reading");
        }
        Some(pending)
    }

    fn build_record(
        &self,
        message: &InboundMessage,
        records: &[ImageOcrRecord],
        reading: &FinalReading,
        intent: ResponseIntent,
    ) -> ReadingRecord {
        ReadingRecord {
            id: Uuid::new_v4(),
            message_sid: message.message_sid.clone(),
            sender: message.sender.clone(),
            message: message.body.clone(),
            meter_type: self.settings.meter_type.clone(),
            meter_number: message.meter_number.clone(),
            media_urls: records.iter().map(|r| r.image_ref.public_url.clone()).collect(),
            reading: reading.value,
            confidence: reading.confidence,
            ocr_results: records.iter().map(OcrDetail::from).collect(),
            intent,
            status: status_for(intent),
            timestamp: Utc::now(),
        }
    }

    /// Drop a confirmation left over from an earlier message. Its record
    /// keeps the `pending` status.
    async fn discard_stale_confirmation(&self, sender: &str) {
        match self.repository.take_confirmation(sender).await {
            Ok(Some(stale)) => {
                info!(record_id = %stale.record_id, "Discarded unanswered confirmation")
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to clear pending confirmation"),
        }
    }

    /// Persistence is best-effort; the reply never depends on it. Returns
    /// whether the record was saved.
    async fn persist(&self, record: &ReadingRecord) -> bool {
        match self.repository.save(record).await {
            Ok(()) => {
                debug!(record_id = %record.id, "Saved reading record");
                true
            }
            Err(e) => {
                error!(record_id = %record.id, error = %e, "Failed to save reading record");
                false
            }
        }
    }

    async fn arm(&self, sender: &str, record_id: Uuid, value: f64, confidence: f64) {
        let pending = PendingConfirmation {
            sender: sender.to_string(),
            record_id,
            value,
            confidence,
            created_at: Utc::now(),
        };
        if let Err(e) = self.repository.arm_confirmation(&pending).await {
            error!(error = %e, "Failed to arm confirmation");
        }
    }

    fn log_reply(&self, message: &InboundMessage, intent: ResponseIntent, value: Option<f64>) {
        EventLogger::log_event(
            &message.message_sid,
            ReadingEvent::Replied {
                intent: format!("{intent:?}"),
                value,
            },
        );
    }

    fn log_failure(&self, message: &InboundMessage, stage: &str, error: &str) {
        EventLogger::log_event(
            &message.message_sid,
            ReadingEvent::Failed {
                stage: stage.to_string(),
                error_msg: error.to_string(),
            },
        );
    }
}

/// Fetch attachment bytes under the retry policy.
pub async fn download_media(
    fetcher: &dyn MediaFetcher,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    url: &str,
) -> Result<Bytes, RetryError<meterline_core::MeterError>> {
    retry_with(policy, sleeper, "download", || fetcher.fetch(url)).await
}

/// Store attachment bytes under the retry policy.
pub async fn upload_media(
    store: &dyn MediaStore,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    key: &str,
    bytes: Bytes,
    content_type: &str,
) -> Result<StoredMedia, RetryError<meterline_core::MeterError>> {
    retry_with(policy, sleeper, "upload", || {
        store.store(key, bytes.clone(), content_type)
    })
    .await
}

/// Run the text detector once; an invocation failure becomes `engine_error`.
pub async fn read_image(
    detector: &dyn TextDetector,
    stored: &StoredMedia,
) -> (ExtractionResult, Vec<DetectedLine>) {
    match detector.detect_text(stored).await {
        Ok(lines) => {
            debug!(engine = detector.name(), lines = lines.len(), "Detected text");
            (extract_reading(&lines), lines)
        }
        Err(e) => {
            error!(engine = detector.name(), key = %stored.key, error = %e, "OCR engine failed");
            (ExtractionResult::engine_error(e.to_string()), Vec::new())
        }
    }
}
