use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Path appended to `SITE_URL` when no explicit redirect URI is configured.
const INSTAGRAM_CALLBACK_PATH: &str = "assets/components/socialstream/getinstagramcode.php";

/// Process configuration loaded from environment variables.
///
/// Per-network credentials live in the settings store, not here.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_path: PathBuf,

    // Import defaults
    pub default_language: String,
    pub instagram_redirect_uri: String,

    // HTTP
    pub http_connect_timeout: Duration,
    pub http_timeout: Duration,
    pub http_fallback_retries: u32,

    // API endpoints
    pub twitter_api_base: String,
    pub instagram_api_base: String,
    pub instagram_authorize_url: String,
    pub youtube_api_base: String,
    pub facebook_graph_base: String,

    // Cache
    pub cache_refresh_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let site_url = env_or_default("SITE_URL", "http://localhost/");

        Ok(Self {
            // Database
            database_path: PathBuf::from(env_or_default(
                "DATABASE_PATH",
                "./data/socialstream.sqlite",
            )),

            // Import defaults
            default_language: env_or_default("DEFAULT_LANGUAGE", "nl"),
            instagram_redirect_uri: optional_env("INSTAGRAM_REDIRECT_URI")
                .unwrap_or_else(|| default_redirect_uri(&site_url)),

            // HTTP
            http_connect_timeout: Duration::from_secs(parse_env_u64(
                "HTTP_CONNECT_TIMEOUT_SECS",
                120,
            )?),
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 120)?),
            http_fallback_retries: parse_env_u32("HTTP_FALLBACK_RETRIES", 5)?,

            // API endpoints
            twitter_api_base: env_or_default("TWITTER_API_BASE", "https://api.twitter.com/1.1"),
            instagram_api_base: env_or_default("INSTAGRAM_API_BASE", "https://api.instagram.com"),
            instagram_authorize_url: env_or_default(
                "INSTAGRAM_AUTHORIZE_URL",
                "https://instagram.com/oauth/authorize/",
            ),
            youtube_api_base: env_or_default(
                "YOUTUBE_API_BASE",
                "https://www.googleapis.com/youtube/v3",
            ),
            facebook_graph_base: env_or_default(
                "FACEBOOK_GRAPH_BASE",
                "https://graph.facebook.com/v2.12",
            ),

            // Cache
            cache_refresh_url: optional_env("CACHE_REFRESH_URL"),
        })
    }

    /// Configuration with fixed values, for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_path: PathBuf::from(":memory:"),
            default_language: "nl".to_string(),
            instagram_redirect_uri: "http://localhost/callback".to_string(),
            http_connect_timeout: Duration::from_secs(5),
            http_timeout: Duration::from_secs(10),
            http_fallback_retries: 5,
            twitter_api_base: "http://127.0.0.1:9/1.1".to_string(),
            instagram_api_base: "http://127.0.0.1:9".to_string(),
            instagram_authorize_url: "http://127.0.0.1:9/oauth/authorize/".to_string(),
            youtube_api_base: "http://127.0.0.1:9/youtube/v3".to_string(),
            facebook_graph_base: "http://127.0.0.1:9/v2.12".to_string(),
            cache_refresh_url: None,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "HTTP_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.http_connect_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "HTTP_CONNECT_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        for (name, value) in [
            ("TWITTER_API_BASE", &self.twitter_api_base),
            ("INSTAGRAM_API_BASE", &self.instagram_api_base),
            ("INSTAGRAM_AUTHORIZE_URL", &self.instagram_authorize_url),
            ("YOUTUBE_API_BASE", &self.youtube_api_base),
            ("FACEBOOK_GRAPH_BASE", &self.facebook_graph_base),
        ] {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: "cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn default_redirect_uri(site_url: &str) -> String {
    if site_url.ends_with('/') {
        format!("{site_url}{INSTAGRAM_CALLBACK_PATH}")
    } else {
        format!("{site_url}/{INSTAGRAM_CALLBACK_PATH}")
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
