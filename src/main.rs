use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use social_stream_importer::cache::HttpCacheTrigger;
use social_stream_importer::config::Config;
use social_stream_importer::db::Database;
use social_stream_importer::http::ApiClient;
use social_stream_importer::importer::{Importer, RunOutcome};
use social_stream_importer::settings;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    match run().await {
        Ok(RunOutcome::Completed(_)) => println!("Import finished."),
        Ok(RunOutcome::Suspended { .. }) => {}
        Err(e) => {
            error!("Fatal error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<RunOutcome> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    info!("Starting social-stream-importer");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    if let Some(parent) = config.database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
    }

    let db = Arc::new(
        Database::new(&config.database_path)
            .await
            .context("Failed to open database")?,
    );
    info!(path = %config.database_path.display(), "Database opened");

    let seeded = settings::seed_from_env(db.as_ref()).await?;
    if seeded > 0 {
        info!(count = seeded, "Seeded settings from environment");
    }

    let api = ApiClient::from_config(&config).context("Failed to build HTTP client")?;
    let cache = HttpCacheTrigger::new(reqwest::Client::new(), config.cache_refresh_url.clone());

    let importer = Importer::new(config, api, db.clone(), db, Arc::new(cache));
    let outcome = importer.run().await?;

    if let RunOutcome::Suspended { authorize_url } = &outcome {
        info!(url = %authorize_url, "Waiting for Instagram authorization");
    }
    Ok(outcome)
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,social_stream_importer=debug"));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    // stdout is reserved for the completion line
    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
