//! Meterline runtime configuration schema.
//!
//! Every section has defaults, so an empty YAML document is a valid config.

use meterline_core::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MeterlineConfig {
    pub server: ServerConfig,
    pub thresholds: ThresholdConfig,
    pub retry: RetryPolicy,
    pub webhook: WebhookConfig,
    pub storage: StorageConfig,
    pub ocr: OcrConfig,
    pub reply: ReplyConfig,
    pub meter: MeterConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Confidence gates for the reply classifier, on the OCR 0–100 scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ThresholdConfig {
    /// Readings strictly above this are accepted outright.
    pub high: f64,
    /// Readings at or below this are rejected. `null` disables the lower tier.
    pub low: Option<f64>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            high: 70.0,
            low: Some(50.0),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookConfig {
    /// Route for inbound message callbacks.
    pub path: String,
    /// Form fields checked, in order, for the meter identifier.
    pub meter_number_fields: Vec<String>,
    /// Basic-auth user for media downloads.
    pub account_sid: Option<String>,
    /// Basic-auth password for media downloads.
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    pub media_dir: String,
    /// Base of the URLs handed out for stored media.
    pub public_base_url: Option<String>,
    pub key_prefix: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OcrConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplyConfig {
    pub unit_label: String,
    /// Append the stored photos to the reply.
    pub echo_media: bool,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            unit_label: "kWh".to_string(),
            echo_media: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MeterConfig {
    pub meter_type: String,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            meter_type: "electricity".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for the rolling NDJSON log; console only when unset.
    pub dir: Option<String>,
    /// Emit console logs as JSON.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_is_default() {
        let cfg: MeterlineConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, MeterlineConfig::default());
        assert_eq!(cfg.thresholds.low, Some(50.0));
    }

    #[test]
    fn explicit_null_disables_low_tier() {
        let cfg: MeterlineConfig =
            serde_yaml::from_str("thresholds:\n  high: 25\n  low: null\n").unwrap();
        assert_eq!(cfg.thresholds.high, 25.0);
        assert_eq!(cfg.thresholds.low, None);
    }

    #[test]
    fn camel_case_keys() {
        let yaml = "retry:\n  maxAttempts: 5\n  initialDelayMs: 100\nreply:\n  unitLabel: m3\n";
        let cfg: MeterlineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.initial_delay_ms, 100);
        assert_eq!(cfg.reply.unit_label, "m3");
        assert!(cfg.reply.echo_media);
    }
}
