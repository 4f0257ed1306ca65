//! Maps the loaded configuration onto the runtime components.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use media::FsMediaStore;
use meterline_channels::{HttpMediaFetcher, MediaCredentials, ReplySettings, TwilioConfig};
use meterline_config::MeterlineConfig;
use meterline_core::{MediaStore, TextDetector};
use meterline_pipeline::{PipelineSettings, ReadingPipeline};
use meterline_store::SqliteReadingStore;
use meterline_understanding::{DisabledTextDetector, HttpTextDetector, OcrEndpoint};

/// Everything `serve` needs, built once at startup.
pub struct Services {
    pub pipeline: Arc<ReadingPipeline>,
    pub store: Arc<SqliteReadingStore>,
    pub media_dir: PathBuf,
}

pub fn pipeline_settings(config: &MeterlineConfig) -> PipelineSettings {
    PipelineSettings {
        thresholds: config.thresholds,
        retry: config.retry.clone(),
        key_prefix: config.storage.key_prefix.clone(),
        meter_type: config.meter.meter_type.clone(),
    }
}

pub fn twilio_config(config: &MeterlineConfig) -> TwilioConfig {
    TwilioConfig {
        webhook_path: config.webhook.path.clone(),
        meter_number_fields: config.webhook.meter_number_fields.clone(),
        reply: ReplySettings {
            unit_label: config.reply.unit_label.clone(),
            echo_media: config.reply.echo_media,
        },
    }
}

pub fn build_services(config: &MeterlineConfig) -> Result<Services> {
    let media_dir = PathBuf::from(&config.storage.media_dir);
    std::fs::create_dir_all(&media_dir)
        .with_context(|| format!("Failed to create media dir: {}", media_dir.display()))?;

    let public_base_url = config
        .storage
        .public_base_url
        .clone()
        .unwrap_or_else(|| format!("http://localhost:{}/media", config.server.port));
    let media_store: Arc<dyn MediaStore> =
        Arc::new(FsMediaStore::new(media_dir.clone(), public_base_url));

    let detector: Arc<dyn TextDetector> = match &config.ocr.endpoint {
        Some(url) => {
            info!(endpoint = %url, "Using HTTP OCR engine");
            Arc::new(HttpTextDetector::new(
                OcrEndpoint {
                    url: url.clone(),
                    api_key: config.ocr.api_key.clone(),
                    timeout: Duration::from_secs(config.ocr.timeout_secs),
                },
                media_store.clone(),
            )?)
        }
        None => {
            warn!("No OCR endpoint configured; readings will be rejected");
            Arc::new(DisabledTextDetector)
        }
    };

    let credentials = MediaCredentials::from_parts(
        config.webhook.account_sid.clone(),
        config.webhook.auth_token.clone(),
    );
    let fetcher = HttpMediaFetcher::new(credentials)?;
    if fetcher.is_authenticated() {
        info!("Media downloads use Twilio account credentials");
    } else {
        warn!("No Twilio credentials, media downloads are unauthenticated");
    }
    let fetcher = Arc::new(fetcher);

    let store = Arc::new(SqliteReadingStore::open(&config.storage.db_path)?);

    let pipeline = ReadingPipeline::new(
        detector,
        media_store,
        fetcher,
        store.clone(),
        pipeline_settings(config),
    );

    Ok(Services {
        pipeline: Arc::new(pipeline),
        store,
        media_dir,
    })
}
