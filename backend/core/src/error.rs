use thiserror::Error;

/// Top-level error type for the Meterline collaborators.
#[derive(Debug, Error)]
pub enum MeterError {
    #[error("media download failed: {0}")]
    Download(String),

    #[error("media upload failed: {0}")]
    Upload(String),

    #[error("OCR engine error: {0}")]
    Engine(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type MeterResult<T> = std::result::Result<T, MeterError>;
