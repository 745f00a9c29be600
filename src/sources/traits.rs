use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::http::ApiClient;
use crate::model::{PostRecord, Source};
use crate::settings::ImportSettings;

/// Everything an adapter needs for one fetch.
#[derive(Clone, Copy)]
pub struct FetchContext<'a> {
    pub api: &'a ApiClient,
    pub config: &'a Config,
    pub settings: &'a ImportSettings,
}

/// Per-network adapter turning API payloads into canonical records.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Network this adapter imports from.
    fn source(&self) -> Source;

    /// Fetch and normalize posts.
    ///
    /// Missing credentials are not an error: the adapter returns no records.
    /// Items without an id are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that abandon the whole source.
    async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<Vec<PostRecord>>;
}
