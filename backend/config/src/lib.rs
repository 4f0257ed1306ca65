//! `meterline-config`: runtime configuration for the meter reading service.
//!
//! Provides:
//! - Typed config schema with defaults for every section
//! - YAML loading from `~/.meterline/config.yaml` or an explicit path
//! - `${ENV_VAR}` substitution and `METERLINE_*` overrides
//! - Config redaction for safe logging
//! - Validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{
    apply_env_overrides, apply_env_overrides_with, resolve_env_vars, resolve_env_vars_with,
    MissingEnvVarError,
};
pub use io::{config_dir, config_file_path, load_config, load_raw};
pub use redact::redact;
pub use schema::{
    LoggingConfig, MeterConfig, MeterlineConfig, OcrConfig, ReplyConfig, ServerConfig,
    StorageConfig, ThresholdConfig, WebhookConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Load, substitute env vars, apply overrides and defaults, then validate.
///
/// With no explicit path the file in [`config_dir`] is used; a missing file
/// yields the defaults. Validation errors fail the load.
pub async fn load_and_prepare(path: Option<&Path>) -> Result<MeterlineConfig> {
    let path: PathBuf = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path(&config_dir()),
    };

    let value = load_raw(&path).await?;
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;

    let config: MeterlineConfig = serde_json::from_value(value)
        .with_context(|| format!("Invalid config at: {}", path.display()))?;
    let config = apply_all_defaults(apply_env_overrides(config));

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if let Some(first) = report.errors.first() {
        for error in &report.errors {
            tracing::error!(path = %error.path, message = %error.message, "Config error");
        }
        bail!("{} config error(s); first: {first}", report.errors.len());
    }

    if let Ok(effective) = serde_json::to_value(&config) {
        tracing::debug!(config = %redact(&effective), "Effective config");
    }
    Ok(config)
}
