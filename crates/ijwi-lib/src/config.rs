//! Environment-sourced service configuration.
//!
//! A `.env` file in the working directory is honoured. Unset variables fall
//! back to [`ServiceConfig::default`].

use std::path::PathBuf;

use ijwi_core::types::{LogFormat, ServiceConfig};

use crate::error::ConfigError;

/// Load configuration from the process environment.
pub fn from_env() -> Result<ServiceConfig, ConfigError> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build configuration from an arbitrary key lookup.
pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<ServiceConfig, ConfigError> {
    let defaults = ServiceConfig::default();
    let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

    let port = match get("PORT") {
        Some(raw) => parse("PORT", &raw)?,
        None => defaults.port,
    };
    let intra_threads = match get("TTS_INTRA_THREADS") {
        Some(raw) => Some(parse("TTS_INTRA_THREADS", &raw)?),
        None => None,
    };
    let log_format = match get("LOG_FORMAT").as_deref().map(str::to_lowercase).as_deref() {
        Some("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    };

    Ok(ServiceConfig {
        model_name: get("TTS_MODEL_NAME").unwrap_or(defaults.model_name),
        model_revision: get("TTS_MODEL_REVISION").unwrap_or(defaults.model_revision),
        onnx_file: get("TTS_ONNX_FILE").unwrap_or(defaults.onnx_file),
        cache_dir: get("TTS_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir),
        hub_endpoint: get("HF_ENDPOINT")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.hub_endpoint),
        hub_token: get("HF_TOKEN"),
        intra_threads,
        host: get("HOST").unwrap_or(defaults.host),
        port,
        log_format,
    })
}

fn parse<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, ServiceConfig::default());
    }

    #[test]
    fn model_name_is_overridable() {
        let cfg = from_lookup(lookup(&[("TTS_MODEL_NAME", "facebook/mms-tts-eng")])).unwrap();
        assert_eq!(cfg.model_name, "facebook/mms-tts-eng");
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = from_lookup(lookup(&[("TTS_MODEL_NAME", "  "), ("PORT", "")])).unwrap();
        assert_eq!(cfg.model_name, "facebook/mms-tts-kin");
        assert_eq!(cfg.port, 8000);
    }

    #[test]
    fn numeric_values_are_parsed() {
        let cfg = from_lookup(lookup(&[("PORT", "9000"), ("TTS_INTRA_THREADS", "4")])).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.intra_threads, Some(4));
    }

    #[test]
    fn invalid_port_is_an_error() {
        let err = from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT", .. }));
    }

    #[test]
    fn log_format_is_case_insensitive() {
        let cfg = from_lookup(lookup(&[("LOG_FORMAT", "JSON")])).unwrap();
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn hub_endpoint_trailing_slash_is_stripped() {
        let cfg = from_lookup(lookup(&[("HF_ENDPOINT", "https://hf-mirror.com/")])).unwrap();
        assert_eq!(cfg.hub_endpoint, "https://hf-mirror.com");
    }
}
