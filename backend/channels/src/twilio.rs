//! Twilio messaging adapter. Receives form-encoded inbound message
//! callbacks (SMS / WhatsApp) and answers synchronously with TwiML.
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Router,
};
use logging::mask_phone;
use meterline_core::{InboundMessage, MediaAttachment};
use meterline_pipeline::ReadingPipeline;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ChannelAdapter;
use crate::twiml::{ReplySettings, render_reply};

/// Twilio delivers at most this many attachments per message.
pub const MAX_MEDIA: usize = 10;

pub struct TwilioConfig {
    pub webhook_path: String,
    /// Form fields checked, in order, for the meter identifier.
    pub meter_number_fields: Vec<String>,
    pub reply: ReplySettings,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            webhook_path: "/webhooks/twilio".to_string(),
            meter_number_fields: vec!["MeterNumber".to_string(), "Meter Number".to_string()],
            reply: ReplySettings::default(),
        }
    }
}

pub struct TwilioAdapter {
    config: TwilioConfig,
    pipeline: Arc<ReadingPipeline>,
}

impl TwilioAdapter {
    pub fn new(config: TwilioConfig, pipeline: Arc<ReadingPipeline>) -> Self {
        Self { config, pipeline }
    }
}

#[derive(Clone)]
struct AppState {
    pipeline: Arc<ReadingPipeline>,
    meter_number_fields: Arc<Vec<String>>,
    reply: Arc<ReplySettings>,
}

fn non_empty(form: &HashMap<String, String>, key: &str) -> Option<String> {
    form.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Build a typed message from the raw callback form.
///
/// Returns `None` when there is no sender. Attachments are read for indices
/// below `NumMedia`, clamped to [`MAX_MEDIA`]; entries missing a URL or
/// content type are dropped.
pub fn parse_inbound(
    form: &HashMap<String, String>,
    meter_number_fields: &[String],
) -> Option<InboundMessage> {
    let sender = non_empty(form, "From")?;
    let body = form.get("Body").cloned().unwrap_or_default();
    let message_sid = non_empty(form, "MessageSid").unwrap_or_else(|| Uuid::new_v4().to_string());
    let meter_number = meter_number_fields
        .iter()
        .find_map(|field| non_empty(form, field));

    let declared = form
        .get("NumMedia")
        .and_then(|n| n.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let declared_media_count = declared.min(MAX_MEDIA);
    if declared > MAX_MEDIA {
        warn!(declared, max = MAX_MEDIA, "NumMedia above limit, clamping");
    }

    let media = (0..declared_media_count)
        .filter_map(|index| {
            let url = non_empty(form, &format!("MediaUrl{index}"))?;
            let content_type = non_empty(form, &format!("MediaContentType{index}"))?;
            Some(MediaAttachment {
                index,
                url,
                content_type,
            })
        })
        .collect::<Vec<_>>();

    if media.len() < declared_media_count {
        warn!(
            declared = declared_media_count,
            usable = media.len(),
            "Some declared attachments are missing a URL or content type"
        );
    }

    Some(InboundMessage {
        sender,
        body,
        message_sid,
        meter_number,
        media,
        declared_media_count,
    })
}

async fn webhook_handler(
    State(state): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let Some(message) = parse_inbound(&form, &state.meter_number_fields) else {
        info!("[Twilio] No sender found, ignoring");
        return (StatusCode::OK, "OK").into_response();
    };

    info!(
        "[Twilio] {} sent {} attachment(s), body {} chars",
        mask_phone(&message.sender),
        message.media.len(),
        message.body.chars().count()
    );

    let outcome = state.pipeline.handle(&message).await;
    let xml = render_reply(&outcome, &state.reply);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        xml,
    )
        .into_response()
}

impl ChannelAdapter for TwilioAdapter {
    fn name(&self) -> &str {
        "twilio"
    }

    fn build_router(&self) -> Router {
        let state = AppState {
            pipeline: self.pipeline.clone(),
            meter_number_fields: Arc::new(self.config.meter_number_fields.clone()),
            reply: Arc::new(self.config.reply.clone()),
        };
        info!("[Twilio] Webhook ready at {}", self.config.webhook_path);
        Router::new()
            .route(&self.config.webhook_path, post(webhook_handler))
            .with_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use bytes::Bytes;
    use meterline_core::{
        DetectedLine, MediaFetcher, MediaStore, MeterError, MeterResult, PendingConfirmation,
        ReadingRecord, ReadingRepository, ReadingStatus, StoredMedia, TextDetector,
    };
    use meterline_pipeline::PipelineSettings;
    use tower::ServiceExt;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn fields() -> Vec<String> {
        TwilioConfig::default().meter_number_fields
    }

    #[test]
    fn accepts_both_meter_number_spellings() {
        let a = parse_inbound(&form(&[("From", "+1"), ("MeterNumber", "M-1")]), &fields()).unwrap();
        assert_eq!(a.meter_number.as_deref(), Some("M-1"));
        let b = parse_inbound(&form(&[("From", "+1"), ("Meter Number", "M-2")]), &fields()).unwrap();
        assert_eq!(b.meter_number.as_deref(), Some("M-2"));
    }

    #[test]
    fn missing_sender_is_none() {
        assert!(parse_inbound(&form(&[("Body", "hi")]), &fields()).is_none());
        assert!(parse_inbound(&form(&[("From", "  ")]), &fields()).is_none());
    }

    #[test]
    fn generates_sid_when_absent() {
        let m = parse_inbound(&form(&[("From", "+1")]), &fields()).unwrap();
        assert!(Uuid::parse_str(&m.message_sid).is_ok());
        assert_eq!(m.body, "");
        assert!(m.media.is_empty());
    }

    #[test]
    fn reads_attachments_up_to_num_media() {
        let m = parse_inbound(
            &form(&[
                ("From", "whatsapp:+15550001111"),
                ("MessageSid", "SM9"),
                ("NumMedia", "3"),
                ("MediaUrl0", "https://api.twilio.com/m/0"),
                ("MediaContentType0", "image/jpeg"),
                ("MediaUrl1", "https://api.twilio.com/m/1"),
                ("MediaContentType1", "audio/ogg"),
                ("MediaUrl3", "https://api.twilio.com/m/3"),
                ("MediaContentType3", "image/png"),
            ]),
            &fields(),
        )
        .unwrap();
        assert_eq!(m.declared_media_count, 3);
        assert_eq!(m.media.len(), 2);
        assert_eq!(m.media[1].index, 1);
        assert!(m.has_image());
        assert_eq!(m.image_attachments().count(), 1);
    }

    #[test]
    fn huge_num_media_is_clamped() {
        let m = parse_inbound(
            &form(&[
                ("From", "+1"),
                ("NumMedia", "18446744073709551615"),
                ("MediaUrl0", "https://m/0"),
                ("MediaContentType0", "image/jpeg"),
                ("MediaUrl10", "https://m/10"),
                ("MediaContentType10", "image/jpeg"),
            ]),
            &fields(),
        )
        .unwrap();
        assert_eq!(m.declared_media_count, MAX_MEDIA);
        assert_eq!(m.media.len(), 1);
        assert_eq!(m.media[0].url, "https://m/0");
    }

    #[test]
    fn bad_num_media_reads_nothing() {
        let m = parse_inbound(
            &form(&[("From", "+1"), ("NumMedia", "two"), ("MediaUrl0", "u"), ("MediaContentType0", "image/png")]),
            &fields(),
        )
        .unwrap();
        assert!(m.media.is_empty());
    }

    struct Unused;

    #[async_trait]
    impl TextDetector for Unused {
        fn name(&self) -> &str {
            "unused"
        }
        async fn detect_text(&self, _media: &StoredMedia) -> MeterResult<Vec<DetectedLine>> {
            Err(MeterError::Engine("not wired".into()))
        }
    }

    #[async_trait]
    impl MediaStore for Unused {
        async fn store(&self, _key: &str, _bytes: Bytes, _content_type: &str) -> MeterResult<StoredMedia> {
            Err(MeterError::Upload("not wired".into()))
        }
        async fn load(&self, _media: &StoredMedia) -> MeterResult<Bytes> {
            Err(MeterError::Storage("not wired".into()))
        }
    }

    #[async_trait]
    impl MediaFetcher for Unused {
        async fn fetch(&self, _url: &str) -> MeterResult<Bytes> {
            Err(MeterError::Download("not wired".into()))
        }
    }

    #[async_trait]
    impl ReadingRepository for Unused {
        async fn save(&self, _record: &ReadingRecord) -> MeterResult<()> {
            Ok(())
        }
        async fn set_status(&self, _id: Uuid, _status: ReadingStatus) -> MeterResult<()> {
            Ok(())
        }
        async fn arm_confirmation(&self, _pending: &PendingConfirmation) -> MeterResult<()> {
            Ok(())
        }
        async fn take_confirmation(&self, _sender: &str) -> MeterResult<Option<PendingConfirmation>> {
            Ok(None)
        }
    }

    fn router() -> Router {
        let unused = Arc::new(Unused);
        let pipeline = ReadingPipeline::new(
            unused.clone(),
            unused.clone(),
            unused.clone(),
            unused,
            PipelineSettings::default(),
        );
        TwilioAdapter::new(TwilioConfig::default(), Arc::new(pipeline)).build_router()
    }

    fn post_form(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/webhooks/twilio")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn no_sender_gets_plain_ok() {
        let resp = router().oneshot(post_form("Body=hello")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn text_message_gets_twiml() {
        let resp = router()
            .oneshot(post_form("From=%2B15550001111&Body=hello&NumMedia=0"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/xml");
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let xml = String::from_utf8(body.to_vec()).unwrap();
        assert!(xml.starts_with("<?xml version='1.0' encoding='UTF-8'?><Response>"));
        assert!(xml.contains("Message received"));
    }

    #[tokio::test]
    async fn unreadable_image_is_rejected_over_http() {
        let resp = router()
            .oneshot(post_form(
                "From=%2B1555&NumMedia=1&MediaUrl0=https%3A%2F%2Fm%2F0&MediaContentType0=image%2Fjpeg",
            ))
            .await
            .unwrap();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let xml = String::from_utf8(body.to_vec()).unwrap();
        assert!(xml.contains("Could not read meter"));
        assert!(!xml.contains("<Media>"));
    }
}
