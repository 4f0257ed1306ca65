//! Config defaults: fills values left blank in the YAML.

use crate::schema::MeterlineConfig;

pub const DEFAULT_WEBHOOK_PATH: &str = "/webhooks/twilio";

/// Both spellings have been seen from the messaging provider.
pub const DEFAULT_METER_NUMBER_FIELDS: &[&str] = &["MeterNumber", "Meter Number"];

pub const DEFAULT_MEDIA_DIR: &str = "media";
pub const DEFAULT_KEY_PREFIX: &str = "meters";
pub const DEFAULT_DB_PATH: &str = "meterline.db";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: MeterlineConfig) -> MeterlineConfig {
    let config = apply_webhook_defaults(config);
    apply_storage_defaults(config)
}

fn apply_webhook_defaults(mut config: MeterlineConfig) -> MeterlineConfig {
    let webhook = &mut config.webhook;
    if webhook.path.trim().is_empty() {
        webhook.path = DEFAULT_WEBHOOK_PATH.to_string();
    }
    if webhook.meter_number_fields.is_empty() {
        webhook.meter_number_fields = DEFAULT_METER_NUMBER_FIELDS
            .iter()
            .map(|f| f.to_string())
            .collect();
    }
    config
}

/// Media served by this process lives under `/media` unless a CDN is configured.
fn apply_storage_defaults(mut config: MeterlineConfig) -> MeterlineConfig {
    let port = config.server.port;
    let storage = &mut config.storage;
    if storage.media_dir.trim().is_empty() {
        storage.media_dir = DEFAULT_MEDIA_DIR.to_string();
    }
    if storage.key_prefix.trim().is_empty() {
        storage.key_prefix = DEFAULT_KEY_PREFIX.to_string();
    }
    if storage.db_path.trim().is_empty() {
        storage.db_path = DEFAULT_DB_PATH.to_string();
    }
    if storage.public_base_url.is_none() {
        storage.public_base_url = Some(format!("http://localhost:{port}/media"));
    }
    config
}
