//! Optical Character Recognition (OCR) engine client.
//!
//! Sends a stored image to an HTTP text-detection endpoint and normalises the
//! answer into detected lines. Two response shapes are understood: a plain
//! `{"lines": [{"text", "confidence"}]}` document, and the block list returned
//! by AWS Textract `DetectDocumentText`, of which only `LINE` blocks are kept.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use meterline_core::{DetectedLine, MediaStore, MeterError, MeterResult, StoredMedia, TextDetector};
use serde::Deserialize;
use tracing::{debug, info};

/// Endpoint settings for [`HttpTextDetector`].
#[derive(Debug, Clone)]
pub struct OcrEndpoint {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Text detector backed by an HTTP OCR service.
pub struct HttpTextDetector {
    endpoint: OcrEndpoint,
    media: Arc<dyn MediaStore>,
    client: reqwest::Client,
}

impl HttpTextDetector {
    pub fn new(endpoint: OcrEndpoint, media: Arc<dyn MediaStore>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(endpoint.timeout)
            .build()
            .context("Failed to build OCR HTTP client")?;
        Ok(Self {
            endpoint,
            media,
            client,
        })
    }
}

#[async_trait]
impl TextDetector for HttpTextDetector {
    fn name(&self) -> &str {
        "http"
    }

    async fn detect_text(&self, media: &StoredMedia) -> MeterResult<Vec<DetectedLine>> {
        info!(key = %media.key, "Running OCR detection on stored image");
        let bytes = self.media.load(media).await?;

        let body = serde_json::json!({
            "key": media.key,
            "url": media.public_url,
            "image": STANDARD.encode(&bytes),
        });

        let mut request = self.client.post(&self.endpoint.url).json(&body);
        if let Some(key) = &self.endpoint.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| MeterError::Engine(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(MeterError::Engine(format!("{status}: {text}")));
        }
        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| MeterError::Engine(e.to_string()))?;

        let lines = parse_detection_response(&json)?;
        for line in &lines {
            debug!(text = %line.text, confidence = line.confidence, "Detected line");
        }
        info!(key = %media.key, lines = lines.len(), "OCR detection complete");
        Ok(lines)
    }
}

/// Stand-in used when no OCR endpoint is configured; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTextDetector;

#[async_trait]
impl TextDetector for DisabledTextDetector {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn detect_text(&self, _media: &StoredMedia) -> MeterResult<Vec<DetectedLine>> {
        Err(MeterError::Engine("no OCR endpoint configured".into()))
    }
}

#[derive(Debug, Deserialize)]
struct LinesResponse {
    lines: Vec<DetectedLine>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlocksResponse {
    blocks: Vec<Block>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Block {
    block_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Normalise an OCR response body into ordered lines.
pub fn parse_detection_response(json: &serde_json::Value) -> MeterResult<Vec<DetectedLine>> {
    if json.get("lines").is_some() {
        let parsed: LinesResponse = serde_json::from_value(json.clone())
            .map_err(|e| MeterError::Engine(format!("malformed lines response: {e}")))?;
        return Ok(parsed.lines);
    }

    if json.get("Blocks").is_some() {
        let parsed: BlocksResponse = serde_json::from_value(json.clone())
            .map_err(|e| MeterError::Engine(format!("malformed Textract response: {e}")))?;
        return Ok(parsed
            .blocks
            .into_iter()
            .filter(|b| b.block_type == "LINE")
            .map(|b| DetectedLine {
                text: b.text.unwrap_or_default(),
                confidence: b.confidence.unwrap_or(0.0),
            })
            .collect());
    }

    Err(MeterError::Engine(
        "unrecognised OCR response: expected `lines` or `Blocks`".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_lines() {
        let body = json!({"lines": [
            {"text": "04821", "confidence": 97.5},
            {"text": "kWh", "confidence": 88.0}
        ]});
        let lines = parse_detection_response(&body).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], DetectedLine::new("04821", 97.5));
    }

    #[test]
    fn keeps_only_textract_line_blocks_in_order() {
        let body = json!({"Blocks": [
            {"BlockType": "PAGE"},
            {"BlockType": "LINE", "Text": "ELSTER", "Confidence": 99.1},
            {"BlockType": "WORD", "Text": "ELSTER", "Confidence": 99.1},
            {"BlockType": "LINE", "Text": "0 4821", "Confidence": 81.0}
        ]});
        let lines = parse_detection_response(&body).unwrap();
        assert_eq!(
            lines,
            vec![DetectedLine::new("ELSTER", 99.1), DetectedLine::new("0 4821", 81.0)]
        );
    }

    #[test]
    fn empty_block_list_is_no_lines() {
        let lines = parse_detection_response(&json!({"Blocks": []})).unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn disabled_detector_always_fails() {
        let media = StoredMedia {
            key: "meters/2026/10/SM1_0.jpeg".into(),
            public_url: "http://localhost/media/meters/2026/10/SM1_0.jpeg".into(),
        };
        let err = DisabledTextDetector.detect_text(&media).await.unwrap_err();
        assert!(matches!(err, MeterError::Engine(_)));
    }

    #[test]
    fn unknown_shape_is_engine_error() {
        let err = parse_detection_response(&json!({"text": "hello"})).unwrap_err();
        assert!(matches!(err, MeterError::Engine(_)));
    }
}
