//! CLI Extract Command
//!
//! Runs the reading extraction chain over a saved OCR line list.

use std::path::Path;

use anyhow::{Context, Result};
use meterline_core::{DetectedLine, ExtractionResult};
use meterline_understanding::extract_reading;

/// Accepts either a bare array of `{text, confidence}` or a full OCR response.
pub fn extract_from_json(raw: &str) -> Result<ExtractionResult> {
    let value: serde_json::Value = serde_json::from_str(raw).context("Input is not valid JSON")?;
    let lines: Vec<DetectedLine> = if value.is_array() {
        serde_json::from_value(value).context("Expected an array of {text, confidence}")?
    } else {
        meterline_understanding::parse_detection_response(&value)?
    };
    Ok(extract_reading(&lines))
}

pub async fn run(path: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let result = extract_from_json(&raw)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
