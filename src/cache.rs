//! Downstream cache invalidation.

use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Invalidates caches that render imported posts.
#[async_trait]
pub trait CacheTrigger: Send + Sync {
    async fn refresh(&self);
}

/// POSTs to a configured URL on refresh; only logs when none is set.
#[derive(Debug, Clone)]
pub struct HttpCacheTrigger {
    client: reqwest::Client,
    url: Option<String>,
}

impl HttpCacheTrigger {
    #[must_use]
    pub fn new(client: reqwest::Client, url: Option<String>) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl CacheTrigger for HttpCacheTrigger {
    async fn refresh(&self) {
        let Some(url) = &self.url else {
            debug!("No cache refresh URL configured");
            return;
        };

        match self.client.post(url).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Cache refreshed");
            }
            Ok(response) => {
                warn!(status = %response.status(), "Cache refresh rejected");
            }
            Err(e) => {
                warn!(error = %e, "Cache refresh failed");
            }
        }
    }
}
