//! `meterline-pipeline`: turns one inbound message into a reply decision.

pub mod classifier;
pub mod pipeline;

pub use classifier::{classify, handshake_intent, status_for};
pub use pipeline::{
    download_media, read_image, upload_media, Outcome, PipelineSettings, ReadingPipeline,
};
