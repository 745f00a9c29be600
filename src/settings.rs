//! Namespaced key/value settings holding per-network credentials.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::db::{self, Database};

/// Namespace prefixed to every settings key.
pub const NAMESPACE: &str = "socialstream";

pub const ACTIVE_DEFAULT: &str = "active_default";
pub const TWITTER_TOKEN: &str = "twitter_token";
pub const TWITTER_TOKEN_SECRET: &str = "twitter_token_secret";
pub const TWITTER_CONSUMER_KEY: &str = "twitter_consumer_key";
pub const TWITTER_CONSUMER_SECRET: &str = "twitter_consumer_secret";
pub const TWITTER_USERNAME: &str = "twitter_username";
pub const TWITTER_SEARCH_QUERY: &str = "twitter_search_query";
pub const INSTAGRAM_ACCESS_TOKEN: &str = "instagram_accesstoken";
pub const INSTAGRAM_USER_ID: &str = "instagram_user_id";
pub const INSTAGRAM_CODE: &str = "instagram_code";
pub const INSTAGRAM_CLIENT_ID: &str = "instagram_client_id";
pub const INSTAGRAM_CLIENT_SECRET: &str = "instagram_client_secret";
pub const INSTAGRAM_SEARCH_QUERY: &str = "instagram_search_query";
pub const INSTAGRAM_USERNAME: &str = "instagram_username";
pub const YOUTUBE_USERNAME: &str = "youtube_username";
pub const YOUTUBE_API_KEY: &str = "youtube_api_key";
pub const FACEBOOK_APP_ID: &str = "facebook_app_id";
pub const FACEBOOK_APP_SECRET: &str = "facebook_app_secret";
pub const FACEBOOK_PAGE: &str = "facebook_page";

/// Every key the importer reads.
pub const ALL_KEYS: &[&str] = &[
    ACTIVE_DEFAULT,
    TWITTER_TOKEN,
    TWITTER_TOKEN_SECRET,
    TWITTER_CONSUMER_KEY,
    TWITTER_CONSUMER_SECRET,
    TWITTER_USERNAME,
    TWITTER_SEARCH_QUERY,
    INSTAGRAM_ACCESS_TOKEN,
    INSTAGRAM_USER_ID,
    INSTAGRAM_CODE,
    INSTAGRAM_CLIENT_ID,
    INSTAGRAM_CLIENT_SECRET,
    INSTAGRAM_SEARCH_QUERY,
    INSTAGRAM_USERNAME,
    YOUTUBE_USERNAME,
    YOUTUBE_API_KEY,
    FACEBOOK_APP_ID,
    FACEBOOK_APP_SECRET,
    FACEBOOK_PAGE,
];

/// Fully qualified key, e.g. `socialstream.twitter_token`.
#[must_use]
pub fn namespaced(key: &str) -> String {
    format!("{NAMESPACE}.{key}")
}

/// Key/value settings store. Keys passed in are unqualified.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Look up a setting.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a setting, returning whether it was stored.
    async fn set(&self, key: &str, value: &str) -> Result<bool>;

    /// Look up a setting, falling back to an empty string.
    async fn get_or_empty(&self, key: &str) -> Result<String> {
        Ok(self.get(key).await?.unwrap_or_default())
    }
}

#[async_trait]
impl SettingsStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        db::get_setting(self.pool(), &namespaced(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<bool> {
        db::set_setting(self.pool(), &namespaced(key), value).await?;
        Ok(true)
    }
}

/// In-memory settings, used by tests and one-off runs.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from unqualified key/value pairs.
    #[must_use]
    pub fn with_values(pairs: &[(&str, &str)]) -> Self {
        let values = pairs
            .iter()
            .map(|(k, v)| (namespaced(k), (*v).to_string()))
            .collect();
        Self {
            values: Mutex::new(values),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        Ok(values.get(&namespaced(key)).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<bool> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        values.insert(namespaced(key), value.to_string());
        Ok(true)
    }
}

/// Keys a run rewrites itself. An environment value for one of these is
/// seeded once; the same value is not written again on later starts.
const SEED_ONCE_KEYS: &[&str] = &[INSTAGRAM_CODE, INSTAGRAM_ACCESS_TOKEN];

fn seed_marker(key: &str) -> String {
    format!("{key}_seeded")
}

/// Copy `SOCIALSTREAM_<KEY>` environment variables into the store.
///
/// Only variables that are present are written. The Instagram code and token
/// are written only when their value differs from the one seeded last, so a
/// consumed code left in the environment is never restored. Returns how many
/// settings were written.
///
/// # Errors
///
/// Returns an error if a setting cannot be read or written.
pub async fn seed_from_env(store: &dyn SettingsStore) -> Result<usize> {
    let mut seeded = 0;
    for key in ALL_KEYS {
        let var = format!("{}_{}", NAMESPACE.to_uppercase(), key.to_uppercase());
        let Ok(value) = std::env::var(&var) else {
            continue;
        };
        let value = value.trim();

        if SEED_ONCE_KEYS.contains(key) {
            let marker = seed_marker(key);
            let last = store
                .get(&marker)
                .await
                .with_context(|| format!("Failed to read seed marker for {key}"))?;
            if last.as_deref() == Some(value) {
                debug!(key = %key, "Setting already seeded from environment");
                continue;
            }
            store
                .set(&marker, value)
                .await
                .with_context(|| format!("Failed to store seed marker for {key}"))?;
        }

        store
            .set(key, value)
            .await
            .with_context(|| format!("Failed to seed setting {key}"))?;
        debug!(key = %key, "Seeded setting from environment");
        seeded += 1;
    }
    Ok(seeded)
}

/// Snapshot of every setting an import run reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSettings {
    pub active_default: bool,

    pub twitter_token: String,
    pub twitter_token_secret: String,
    pub twitter_consumer_key: String,
    pub twitter_consumer_secret: String,
    pub twitter_usernames: Vec<String>,
    pub twitter_search_terms: Vec<String>,

    pub instagram_access_token: String,
    pub instagram_user_id: String,
    pub instagram_client_id: String,
    pub instagram_client_secret: String,
    pub instagram_code: String,
    pub instagram_tags: Vec<String>,
    pub instagram_username: String,

    pub youtube_username: String,
    pub youtube_api_key: String,

    pub facebook_app_id: String,
    pub facebook_app_secret: String,
    pub facebook_page: String,
}

impl ImportSettings {
    /// Read all settings from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn load(store: &dyn SettingsStore) -> Result<Self> {
        let get = |key: &'static str| async move {
            store
                .get_or_empty(key)
                .await
                .map(|v| v.trim().to_string())
                .with_context(|| format!("Failed to read setting {key}"))
        };

        Ok(Self {
            active_default: parse_flag(&get(ACTIVE_DEFAULT).await?),

            twitter_token: get(TWITTER_TOKEN).await?,
            twitter_token_secret: get(TWITTER_TOKEN_SECRET).await?,
            twitter_consumer_key: get(TWITTER_CONSUMER_KEY).await?,
            twitter_consumer_secret: get(TWITTER_CONSUMER_SECRET).await?,
            twitter_usernames: split_list(&get(TWITTER_USERNAME).await?),
            twitter_search_terms: split_list(&get(TWITTER_SEARCH_QUERY).await?),

            instagram_access_token: get(INSTAGRAM_ACCESS_TOKEN).await?,
            instagram_user_id: get(INSTAGRAM_USER_ID).await?,
            instagram_client_id: get(INSTAGRAM_CLIENT_ID).await?,
            instagram_client_secret: get(INSTAGRAM_CLIENT_SECRET).await?,
            instagram_code: get(INSTAGRAM_CODE).await?,
            instagram_tags: split_list(&get(INSTAGRAM_SEARCH_QUERY).await?)
                .into_iter()
                .map(|tag| tag.replace('#', ""))
                .filter(|tag| !tag.is_empty())
                .collect(),
            instagram_username: get(INSTAGRAM_USERNAME).await?,

            youtube_username: get(YOUTUBE_USERNAME).await?,
            youtube_api_key: get(YOUTUBE_API_KEY).await?,

            facebook_app_id: get(FACEBOOK_APP_ID).await?,
            facebook_app_secret: get(FACEBOOK_APP_SECRET).await?,
            facebook_page: get(FACEBOOK_PAGE).await?,
        })
    }
}

/// Split a comma-separated setting, trimming entries and dropping empty ones.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
