use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::MeterResult;
use crate::types::{DetectedLine, PendingConfirmation, ReadingRecord, ReadingStatus, StoredMedia};

/// Text detection over a stored image.
///
/// Implementations return lines in detection order. A failure here means the
/// engine could not be invoked at all, not that nothing was read.
#[async_trait]
pub trait TextDetector: Send + Sync {
    /// Engine name for logging (e.g. "http", "textract").
    fn name(&self) -> &str;

    async fn detect_text(&self, media: &StoredMedia) -> MeterResult<Vec<DetectedLine>>;
}

/// Durable storage for inbound media.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn store(&self, key: &str, bytes: Bytes, content_type: &str) -> MeterResult<StoredMedia>;

    /// Read back a previously stored object.
    async fn load(&self, media: &StoredMedia) -> MeterResult<Bytes>;
}

/// Downloads attachment bytes from the messaging provider.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> MeterResult<Bytes>;
}

/// Persistence for reading records and the confirmation handshake.
#[async_trait]
pub trait ReadingRepository: Send + Sync {
    async fn save(&self, record: &ReadingRecord) -> MeterResult<()>;

    async fn set_status(&self, id: Uuid, status: ReadingStatus) -> MeterResult<()>;

    /// Arm the handshake for a sender, replacing any earlier pending reading.
    async fn arm_confirmation(&self, pending: &PendingConfirmation) -> MeterResult<()>;

    /// Remove and return the sender's pending reading, if any.
    async fn take_confirmation(&self, sender: &str) -> MeterResult<Option<PendingConfirmation>>;
}
