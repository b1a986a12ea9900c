//! Environment-driven configuration.
//!
//! Credentials are never compiled in. Without an API key the matching HTTP
//! feature stays disabled.

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;
use crate::store::StorePolicy;

pub const DEFAULT_DB_URL: &str = "sqlite://ulingo.sqlite3";
const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeechConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub voice: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub db_url: String,
    pub store: StorePolicy,
    pub http_timeout: Duration,
    pub speech: Option<SpeechConfig>,
    pub chat: Option<ChatConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.to_string(),
            store: StorePolicy::default(),
            http_timeout: Duration::from_secs(15),
            speech: None,
            chat: None,
        }
    }
}

impl AppConfig {
    /// Read `ULINGO_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed numbers or URLs.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed numbers or URLs.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let db_url = lookup("ULINGO_DB_URL").unwrap_or(defaults.db_url);
        let store = StorePolicy {
            timeout: millis(&lookup, "ULINGO_STORE_TIMEOUT_MS")?.unwrap_or(defaults.store.timeout),
            write_attempts: number(&lookup, "ULINGO_WRITE_ATTEMPTS")?
                .unwrap_or(u64::from(defaults.store.write_attempts))
                .try_into()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: "ULINGO_WRITE_ATTEMPTS",
                    raw: lookup("ULINGO_WRITE_ATTEMPTS").unwrap_or_default(),
                })?,
        };
        let http_timeout = millis(&lookup, "ULINGO_HTTP_TIMEOUT_MS")?.unwrap_or(defaults.http_timeout);

        let speech = match lookup("ULINGO_TTS_API_KEY") {
            Some(api_key) => Some(SpeechConfig {
                base_url: base_url(&lookup, "ULINGO_TTS_BASE_URL")?,
                api_key,
                model: lookup("ULINGO_TTS_MODEL").unwrap_or_else(|| "tts-1".into()),
                voice: lookup("ULINGO_TTS_VOICE").unwrap_or_else(|| "alloy".into()),
            }),
            None => None,
        };

        let chat = match lookup("ULINGO_CHAT_API_KEY") {
            Some(api_key) => Some(ChatConfig {
                base_url: base_url(&lookup, "ULINGO_CHAT_BASE_URL")?,
                api_key,
                model: lookup("ULINGO_CHAT_MODEL").unwrap_or_else(|| "gpt-4o-mini".into()),
            }),
            None => None,
        };

        Ok(Self {
            db_url,
            store,
            http_timeout,
            speech,
            chat,
        })
    }

    #[must_use]
    pub fn with_db_url(mut self, db_url: impl Into<String>) -> Self {
        self.db_url = db_url.into();
        self
    }
}

fn number(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::InvalidNumber { var, raw }),
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(number(lookup, var)?.map(Duration::from_millis))
}

fn base_url(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<String, ConfigError> {
    let raw = lookup(var).unwrap_or_else(|| DEFAULT_OPENAI_BASE.to_string());
    match Url::parse(&raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            Ok(raw.trim_end_matches('/').to_string())
        }
        _ => Err(ConfigError::InvalidUrl { var, raw }),
    }
}
