use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "echomed";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "echomed=info"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

/// Process-wide configuration, constructed once at startup and passed
/// explicitly into the service adapters. Pipeline logic never reads
/// credentials from the environment itself.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bearer token for the speech and text-generation services.
    pub api_key: String,
    /// Base URL of the OpenAI-compatible API.
    pub api_base_url: String,
    /// Chat-completion model used by all extraction stages.
    pub chat_model: String,
    /// Speech-to-text model used by the transcription adapter.
    pub speech_model: String,
    /// Per-request timeout for blocking service calls.
    pub request_timeout_secs: u64,
}

impl AppConfig {
    /// Configuration with service defaults and an explicit API key.
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4".to_string(),
            speech_model: "whisper-1".to_string(),
            request_timeout_secs: 120,
        }
    }

    /// Build configuration from the environment.
    ///
    /// `OPENAI_API_KEY` is required; `ECHOMED_API_BASE_URL`,
    /// `ECHOMED_CHAT_MODEL`, `ECHOMED_SPEECH_MODEL` and
    /// `ECHOMED_TIMEOUT_SECS` override the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY"))?;
        let mut config = Self::new(&api_key);

        if let Ok(url) = std::env::var("ECHOMED_API_BASE_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("ECHOMED_CHAT_MODEL") {
            config.chat_model = model;
        }
        if let Ok(model) = std::env::var("ECHOMED_SPEECH_MODEL") {
            config.speech_model = model;
        }
        if let Ok(secs) = std::env::var("ECHOMED_TIMEOUT_SECS") {
            config.request_timeout_secs =
                secs.parse().map_err(|_| ConfigError::InvalidVar {
                    var: "ECHOMED_TIMEOUT_SECS",
                    value: secs,
                })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_service_defaults() {
        let config = AppConfig::new("sk-test");
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.api_base_url, "https://api.openai.com/v1");
        assert_eq!(config.chat_model, "gpt-4");
        assert_eq!(config.speech_model, "whisper-1");
        assert_eq!(config.request_timeout_secs, 120);
    }

    #[test]
    fn app_name_is_echomed() {
        assert_eq!(APP_NAME, "echomed");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn default_filter_scopes_to_crate() {
        assert!(default_log_filter().starts_with("echomed"));
    }
}
