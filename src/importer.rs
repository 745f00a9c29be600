//! One import run: cache refresh, token resolution, every source in turn.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cache::CacheTrigger;
use crate::config::Config;
use crate::http::ApiClient;
use crate::model::Source;
use crate::settings::{ImportSettings, SettingsStore};
use crate::sources::{self, FetchContext, SourceAdapter};
use crate::store::{self, RecordStore, Upserted};
use crate::token::{TokenManager, TokenOutcome};

/// What happened to one source during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub source: Source,
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    /// Records whose upsert failed.
    pub failed: usize,
    /// The source was abandoned before any record was stored.
    pub aborted: bool,
}

impl SourceSummary {
    const fn new(source: Source) -> Self {
        Self {
            source,
            fetched: 0,
            created: 0,
            updated: 0,
            failed: 0,
            aborted: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sources: Vec<SourceSummary>,
}

impl RunSummary {
    #[must_use]
    pub fn get(&self, source: Source) -> Option<&SourceSummary> {
        self.sources.iter().find(|s| s.source == source)
    }

    #[must_use]
    pub fn stored(&self) -> usize {
        self.sources.iter().map(|s| s.created + s.updated).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Waiting for the user to authorize Instagram; nothing was imported.
    Suspended { authorize_url: String },
}

pub struct Importer {
    config: Config,
    api: ApiClient,
    settings: Arc<dyn SettingsStore>,
    records: Arc<dyn RecordStore>,
    cache: Arc<dyn CacheTrigger>,
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl Importer {
    /// Build an importer running every source in the standard order.
    #[must_use]
    pub fn new(
        config: Config,
        api: ApiClient,
        settings: Arc<dyn SettingsStore>,
        records: Arc<dyn RecordStore>,
        cache: Arc<dyn CacheTrigger>,
    ) -> Self {
        Self {
            config,
            api,
            settings,
            records,
            cache,
            adapters: sources::default_adapters(),
        }
    }

    /// Replace the adapters, keeping their order.
    #[must_use]
    pub fn with_adapters(mut self, adapters: Vec<Box<dyn SourceAdapter>>) -> Self {
        self.adapters = adapters;
        self
    }

    /// Run one import.
    ///
    /// Source failures are logged and counted, never returned.
    ///
    /// # Errors
    ///
    /// Returns an error only if the settings cannot be read.
    pub async fn run(&self) -> Result<RunOutcome> {
        self.cache.refresh().await;

        let mut settings = ImportSettings::load(self.settings.as_ref())
            .await
            .context("Failed to load import settings")?;

        let tokens = TokenManager::new(
            &self.api,
            &self.config,
            self.settings.as_ref(),
            self.cache.as_ref(),
        );
        settings.instagram_access_token = match tokens.resolve(&settings).await {
            Ok(TokenOutcome::Active(token)) => token,
            Ok(TokenOutcome::Suspended { authorize_url }) => {
                return Ok(RunOutcome::Suspended { authorize_url });
            }
            Ok(TokenOutcome::Unavailable) => String::new(),
            Err(e) => {
                warn!(error = %e, "Instagram token resolution failed");
                String::new()
            }
        };

        let ctx = FetchContext {
            api: &self.api,
            config: &self.config,
            settings: &settings,
        };

        let mut summary = RunSummary::default();
        for adapter in &self.adapters {
            summary
                .sources
                .push(self.import_source(adapter.as_ref(), &ctx).await);
        }

        self.cache.refresh().await;
        info!(stored = summary.stored(), "Import run complete");
        Ok(RunOutcome::Completed(summary))
    }

    async fn import_source(&self, adapter: &dyn SourceAdapter, ctx: &FetchContext<'_>) -> SourceSummary {
        let source = adapter.source();
        let mut summary = SourceSummary::new(source);

        let records = match adapter.fetch(ctx).await {
            Ok(records) => records,
            Err(e) => {
                warn!(source = %source, error = %e, "Source import aborted");
                summary.aborted = true;
                return summary;
            }
        };

        summary.fetched = records.len();
        for record in records {
            let source_id = record.source_id.clone();
            match store::upsert(self.records.as_ref(), record, ctx.settings.active_default).await {
                Ok(Upserted::Created) => summary.created += 1,
                Ok(Upserted::Updated) => summary.updated += 1,
                Err(e) => {
                    warn!(source = %source, source_id = %source_id, error = %e, "Failed to store post");
                    summary.failed += 1;
                }
            }
        }

        info!(
            source = %source,
            created = summary.created,
            updated = summary.updated,
            failed = summary.failed,
            "Source imported"
        );
        summary
    }
}
