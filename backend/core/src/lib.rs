pub mod error;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::{MeterError, MeterResult};
pub use retry::{retry, retry_with, RetryError, RetryPolicy, Sleeper, TokioSleeper};
pub use traits::{MediaFetcher, MediaStore, ReadingRepository, TextDetector};
pub use types::{
    DetectedLine, ExtractionMethod, ExtractionResult, FinalReading, ImageOcrRecord,
    InboundMessage, MediaAttachment, OcrDetail, PendingConfirmation, ReadingRecord,
    ReadingStatus, ResponseIntent, StoredMedia,
};
