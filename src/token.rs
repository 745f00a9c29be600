//! Instagram OAuth authorization-code exchange.
//!
//! A run moves through at most one of these transitions:
//!
//! - a stored token with a user id is checked with a self-lookup and, when it
//!   answers, used as is;
//! - a stored token that was not rejected is used while no code is pending;
//! - a client id without a stored code or token yields an authorize URL and
//!   suspends the run until the redirect callback stores a code;
//! - a stored code with client credentials is exchanged once for a token, then
//!   cleared.

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::CacheTrigger;
use crate::config::Config;
use crate::http::ApiClient;
use crate::settings::{ImportSettings, SettingsStore, INSTAGRAM_ACCESS_TOKEN, INSTAGRAM_CODE};

/// Where the Instagram credentials stand before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    NoToken,
    AwaitingCode,
    CodeReceived,
    TokenActive,
}

impl TokenState {
    /// Classify stored settings.
    ///
    /// `token_rejected` is set when a self-lookup refused the stored token;
    /// such a token no longer counts and a new authorization is requested.
    #[must_use]
    pub fn of(settings: &ImportSettings, token_rejected: bool) -> Self {
        let has_client = !settings.instagram_client_id.is_empty();
        let has_code = !settings.instagram_code.is_empty();
        let has_token = !settings.instagram_access_token.is_empty() && !token_rejected;

        if has_client && has_code && !settings.instagram_client_secret.is_empty() {
            Self::CodeReceived
        } else if has_token {
            Self::TokenActive
        } else if has_client && !has_code {
            Self::AwaitingCode
        } else {
            Self::NoToken
        }
    }
}

/// Result of resolving the token for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOutcome {
    /// Import Instagram with this token.
    Active(String),
    /// The user must authorize the app first; the run stops here.
    Suspended { authorize_url: String },
    /// Skip Instagram this run.
    Unavailable,
}

pub struct TokenManager<'a> {
    api: &'a ApiClient,
    config: &'a Config,
    store: &'a dyn SettingsStore,
    cache: &'a dyn CacheTrigger,
}

impl<'a> TokenManager<'a> {
    #[must_use]
    pub fn new(
        api: &'a ApiClient,
        config: &'a Config,
        store: &'a dyn SettingsStore,
        cache: &'a dyn CacheTrigger,
    ) -> Self {
        Self {
            api,
            config,
            store,
            cache,
        }
    }

    /// Work out which token, if any, Instagram imports with.
    ///
    /// # Errors
    ///
    /// Returns an error if the authorize URL cannot be built or the new token
    /// cannot be written to the settings store.
    pub async fn resolve(&self, settings: &ImportSettings) -> Result<TokenOutcome> {
        let token = &settings.instagram_access_token;
        let mut rejected = false;

        if !token.is_empty() && !settings.instagram_user_id.is_empty() {
            if self.validate(token).await {
                debug!("Stored Instagram token is valid");
                return Ok(TokenOutcome::Active(token.clone()));
            }
            warn!("Stored Instagram token was rejected");
            rejected = true;
        }

        match TokenState::of(settings, rejected) {
            TokenState::AwaitingCode => {
                let authorize_url = self.authorize_url(&settings.instagram_client_id)?;
                // The response is irrelevant; the provider answers through the redirect.
                let _ = self.api.get(&authorize_url, None).await;
                info!("Instagram authorization required, suspending run");
                Ok(TokenOutcome::Suspended { authorize_url })
            }
            TokenState::CodeReceived => self.exchange(settings).await,
            TokenState::TokenActive => Ok(TokenOutcome::Active(token.clone())),
            TokenState::NoToken => Ok(TokenOutcome::Unavailable),
        }
    }

    async fn validate(&self, token: &str) -> bool {
        let url = format!(
            "{}/v1/users/self?access_token={}",
            self.api_base(),
            urlencoding::encode(token)
        );
        self.api
            .get_json(&url, None)
            .await
            .is_some_and(|response| response.get("data").is_some_and(Value::is_object))
    }

    /// Provider URL the user visits to grant access.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorize endpoint is not a URL.
    pub fn authorize_url(&self, client_id: &str) -> Result<String> {
        let url = url::Url::parse_with_params(
            &self.config.instagram_authorize_url,
            &[
                ("client_id", client_id),
                ("redirect_uri", self.config.instagram_redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "public_content"),
            ],
        )
        .context("Invalid Instagram authorize URL")?;
        Ok(url.into())
    }

    async fn exchange(&self, settings: &ImportSettings) -> Result<TokenOutcome> {
        let url = format!("{}/oauth/access_token", self.api_base());
        let response = self
            .api
            .post_form_json(
                &url,
                &[
                    ("client_id", settings.instagram_client_id.as_str()),
                    ("client_secret", settings.instagram_client_secret.as_str()),
                    ("redirect_uri", self.config.instagram_redirect_uri.as_str()),
                    ("grant_type", "authorization_code"),
                    ("code", settings.instagram_code.as_str()),
                ],
            )
            .await;

        let Some(token) = response.as_ref().and_then(exchanged_token) else {
            warn!("Instagram code exchange failed");
            return Ok(TokenOutcome::Unavailable);
        };

        self.store
            .set(INSTAGRAM_ACCESS_TOKEN, &token)
            .await
            .context("Failed to store Instagram access token")?;
        self.store
            .set(INSTAGRAM_CODE, "")
            .await
            .context("Failed to clear Instagram code")?;
        info!("Instagram access token obtained");

        self.cache.refresh().await;
        Ok(TokenOutcome::Active(token))
    }

    fn api_base(&self) -> &str {
        self.config.instagram_api_base.trim_end_matches('/')
    }
}

/// The access token of a successful exchange response.
///
/// Error responses carry a `code` field.
fn exchanged_token(response: &Value) -> Option<String> {
    if response.get("code").is_some() {
        return None;
    }
    response
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn settings(token: &str, client_id: &str, secret: &str, code: &str) -> ImportSettings {
        ImportSettings {
            instagram_access_token: token.to_string(),
            instagram_client_id: client_id.to_string(),
            instagram_client_secret: secret.to_string(),
            instagram_code: code.to_string(),
            ..ImportSettings::default()
        }
    }

    #[test]
    fn test_token_state() {
        let of = |s: ImportSettings| TokenState::of(&s, false);
        assert_eq!(of(settings("", "", "", "")), TokenState::NoToken);
        assert_eq!(of(settings("", "id", "", "")), TokenState::AwaitingCode);
        assert_eq!(of(settings("", "id", "secret", "")), TokenState::AwaitingCode);
        assert_eq!(of(settings("", "id", "secret", "abc")), TokenState::CodeReceived);
        assert_eq!(of(settings("tok", "", "", "")), TokenState::TokenActive);
        assert_eq!(of(settings("tok", "id", "secret", "abc")), TokenState::CodeReceived);
        // A token obtained earlier is kept once the code has been cleared.
        assert_eq!(of(settings("tok", "id", "secret", "")), TokenState::TokenActive);
        // A code without a secret cannot be exchanged.
        assert_eq!(of(settings("", "id", "", "abc")), TokenState::NoToken);
    }

    #[test]
    fn test_rejected_token_state() {
        let rejected = |s: ImportSettings| TokenState::of(&s, true);
        assert_eq!(rejected(settings("tok", "", "", "")), TokenState::NoToken);
        assert_eq!(rejected(settings("tok", "id", "secret", "")), TokenState::AwaitingCode);
        assert_eq!(rejected(settings("tok", "id", "secret", "abc")), TokenState::CodeReceived);
    }

    #[test]
    fn test_exchanged_token() {
        assert_eq!(
            exchanged_token(&json!({"access_token": "tok", "user": {"id": "1"}})).as_deref(),
            Some("tok")
        );
        assert_eq!(
            exchanged_token(&json!({
                "code": 400,
                "error_type": "OAuthException",
                "error_message": "Matching code was not found or was already used."
            })),
            None
        );
        assert_eq!(exchanged_token(&json!({"access_token": ""})), None);
        assert_eq!(exchanged_token(&json!({})), None);
    }

    #[test]
    fn test_authorize_url() {
        struct NoCache;

        #[async_trait::async_trait]
        impl CacheTrigger for NoCache {
            async fn refresh(&self) {}
        }

        let config = Config::for_testing();
        let api = ApiClient::from_config(&config).unwrap();
        let store = crate::settings::MemorySettings::new();
        let manager = TokenManager::new(&api, &config, &store, &NoCache);

        let url = manager.authorize_url("client 1").unwrap();
        assert_eq!(
            url,
            "http://127.0.0.1:9/oauth/authorize/?client_id=client+1&redirect_uri=http%3A%2F%2Flocalhost%2Fcallback&response_type=code&scope=public_content"
        );
    }
}
