//! Environment handling for config values.
//!
//! Two mechanisms:
//! - `${VAR_NAME}` references inside YAML string values, resolved at load
//!   time. Only uppercase `[A-Z_][A-Z0-9_]*` names are matched, and `$${VAR}`
//!   escapes to a literal `${VAR}`.
//! - Well-known `METERLINE_*` / `TWILIO_*` variables that override individual
//!   settings, so the service can run without a config file.

use std::collections::HashMap;

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::schema::MeterlineConfig;

/// `$${NAME}` (escaped) or `${NAME}`.
static ENV_REF_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references using the process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute `${VAR}` references using a provided map.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let substituted = ENV_REF_PATTERN.replace_all(s, |caps: &Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{name}}}");
        }
        match env.get(name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(substituted.into_owned())
}

/// Apply `METERLINE_*` and `TWILIO_*` overrides from the process environment.
pub fn apply_env_overrides(config: MeterlineConfig) -> MeterlineConfig {
    apply_env_overrides_with(config, &std::env::vars().collect())
}

/// Apply overrides from a provided map.
pub fn apply_env_overrides_with(
    mut config: MeterlineConfig,
    env: &HashMap<String, String>,
) -> MeterlineConfig {
    let get = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();

    if let Some(bind) = get("METERLINE_BIND") {
        config.server.bind_address = bind;
    }
    if let Some(port) = get("METERLINE_PORT").and_then(|p| p.parse().ok()) {
        config.server.port = port;
    }
    if let Some(db) = get("METERLINE_DB") {
        config.storage.db_path = db;
    }
    if let Some(dir) = get("METERLINE_MEDIA_DIR") {
        config.storage.media_dir = dir;
    }
    if let Some(url) = get("METERLINE_PUBLIC_BASE_URL") {
        config.storage.public_base_url = Some(url);
    }
    if let Some(endpoint) = get("METERLINE_OCR_ENDPOINT") {
        config.ocr.endpoint = Some(endpoint);
    }
    if let Some(key) = get("METERLINE_OCR_API_KEY") {
        config.ocr.api_key = Some(key);
    }
    if let Some(sid) = get("TWILIO_ACCOUNT_SID") {
        config.webhook.account_sid = Some(sid);
    }
    if let Some(token) = get("TWILIO_AUTH_TOKEN") {
        config.webhook.auth_token = Some(token);
    }
    if let Some(level) = get("RUST_LOG") {
        config.logging.level = level;
    }
    config
}
