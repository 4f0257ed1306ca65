//! Config validation: range and shape checks with user-friendly messages.

use crate::schema::MeterlineConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &MeterlineConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_thresholds(config, &mut report);
    validate_retry(config, &mut report);
    validate_webhook(config, &mut report);
    validate_server(config, &mut report);
    validate_ocr(config, &mut report);
    report
}

fn in_confidence_range(v: f64) -> bool {
    (0.0..=100.0).contains(&v)
}

fn validate_thresholds(config: &MeterlineConfig, report: &mut ValidationReport) {
    let t = &config.thresholds;
    if !in_confidence_range(t.high) {
        report.error("thresholds.high", "Must be between 0 and 100");
    }
    if let Some(low) = t.low {
        if !in_confidence_range(low) {
            report.error("thresholds.low", "Must be between 0 and 100");
        } else if low >= t.high {
            report.error("thresholds.low", "Must be below thresholds.high");
        }
    }
}

fn validate_retry(config: &MeterlineConfig, report: &mut ValidationReport) {
    if config.retry.max_attempts == 0 {
        report.error("retry.maxAttempts", "Must be at least 1");
    }
}

fn validate_webhook(config: &MeterlineConfig, report: &mut ValidationReport) {
    let webhook = &config.webhook;
    if !webhook.path.starts_with('/') {
        report.error("webhook.path", "Route must start with '/'");
    }
    if webhook.meter_number_fields.iter().all(|f| f.trim().is_empty()) {
        report.error("webhook.meterNumberFields", "At least one field name is required");
    }
    if webhook.account_sid.is_none() || webhook.auth_token.is_none() {
        report.warn(
            "webhook",
            "No Twilio credentials; media downloads will be unauthenticated",
        );
    }
}

fn validate_server(config: &MeterlineConfig, report: &mut ValidationReport) {
    if config.server.port != 0 && config.server.port < 1024 {
        report.warn("server.port", "Privileged port; binding may require elevated rights");
    }
}

fn validate_ocr(config: &MeterlineConfig, report: &mut ValidationReport) {
    if config.ocr.endpoint.is_none() {
        report.warn(
            "ocr.endpoint",
            "No OCR endpoint configured; every image will report an engine error",
        );
    }
    if config.ocr.timeout_secs == 0 {
        report.error("ocr.timeoutSecs", "Must be greater than 0");
    }
}
