//! # Configuration
//!
//! Process configuration read once at startup from the environment (and `.env`
//! via dotenvy in the binary). Everything downstream receives a `Config` value;
//! no module below this one touches `std::env`.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.0.0: Initial release

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::features::invocation::RetryConfig;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_FALLBACK_MODELS: &str = "gemini-pro";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct Config {
    /// Missing key is not a startup failure; every chat request reports it instead
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    /// Preferred model first, fallbacks after
    pub model_candidates: Vec<String>,
    pub retry: RetryConfig,
    pub call_timeout: Duration,
    pub request_timeout: Duration,
    /// Attach raw failure detail to error responses
    pub debug_errors: bool,
    pub port: u16,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window: Duration,
    pub personas_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let preferred = get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let fallbacks =
            get("GEMINI_FALLBACK_MODELS").unwrap_or_else(|| DEFAULT_FALLBACK_MODELS.to_string());

        let mut model_candidates = vec![preferred];
        for model in fallbacks.split(',').map(str::trim).filter(|m| !m.is_empty()) {
            if !model_candidates.iter().any(|m| m == model) {
                model_candidates.push(model.to_string());
            }
        }

        let max_retries: u32 = parse_or(&get, "GENAI_MAX_RETRIES", 3)?;
        if max_retries == 0 {
            anyhow::bail!("GENAI_MAX_RETRIES must be at least 1");
        }

        let app_env = get("APP_ENV").or_else(|| get("NODE_ENV"));

        Ok(Config {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_api_base: get("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            model_candidates,
            retry: RetryConfig {
                max_retries,
                base_delay: Duration::from_millis(parse_or(&get, "GENAI_BASE_DELAY_MS", 500)?),
                jitter_ceiling: Duration::from_millis(parse_or(&get, "GENAI_JITTER_MS", 200)?),
            },
            call_timeout: Duration::from_millis(parse_or(&get, "GENAI_CALL_TIMEOUT_MS", 20_000)?),
            request_timeout: Duration::from_millis(parse_or(
                &get,
                "GENAI_REQUEST_TIMEOUT_MS",
                60_000,
            )?),
            debug_errors: app_env.as_deref() == Some("development"),
            port: parse_or(&get, "PORT", 3000)?,
            rate_limit_max_requests: parse_or(&get, "RATE_LIMIT_MAX_REQUESTS", 100)?,
            rate_limit_window: Duration::from_secs(parse_or(&get, "RATE_LIMIT_WINDOW_SECS", 900)?),
            personas_path: get("PERSONAS_PATH").map(PathBuf::from),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.gemini_api_key.is_some()
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(config.gemini_api_key.is_none());
        assert!(!config.has_credentials());
        assert_eq!(config.model_candidates, vec!["gemini-1.5-flash", "gemini-pro"]);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(500));
        assert_eq!(config.retry.jitter_ceiling, Duration::from_millis(200));
        assert_eq!(config.port, 3000);
        assert_eq!(config.rate_limit_max_requests, 100);
        assert_eq!(config.rate_limit_window, Duration::from_secs(900));
        assert!(!config.debug_errors);
    }

    #[test]
    fn test_model_candidates_deduplicated() {
        let config = config_from(&[
            ("GEMINI_MODEL", "gemini-2.0-flash"),
            ("GEMINI_FALLBACK_MODELS", "gemini-1.5-flash, gemini-2.0-flash,,gemini-pro"),
        ])
        .unwrap();
        assert_eq!(
            config.model_candidates,
            vec!["gemini-2.0-flash", "gemini-1.5-flash", "gemini-pro"]
        );
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let config = config_from(&[("GEMINI_API_KEY", "   ")]).unwrap();
        assert!(!config.has_credentials());

        let config = config_from(&[("GEMINI_API_KEY", "abc")]).unwrap();
        assert_eq!(config.gemini_api_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_debug_errors_from_node_env_fallback() {
        assert!(config_from(&[("NODE_ENV", "development")]).unwrap().debug_errors);
        assert!(config_from(&[("APP_ENV", "development")]).unwrap().debug_errors);
        assert!(
            !config_from(&[("APP_ENV", "production"), ("NODE_ENV", "development")])
                .unwrap()
                .debug_errors
        );
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = config_from(&[("GENAI_MAX_RETRIES", "lots")]).unwrap_err();
        assert!(err.to_string().contains("GENAI_MAX_RETRIES"));
    }

    #[test]
    fn test_zero_retries_rejected() {
        assert!(config_from(&[("GENAI_MAX_RETRIES", "0")]).is_err());
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        let config = config_from(&[("GEMINI_API_BASE", "http://localhost:8080/")]).unwrap();
        assert_eq!(config.gemini_api_base, "http://localhost:8080");
    }
}
