use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use thread_digest::accounts::resolve_accounts;
use thread_digest::config::Config;
use thread_digest::fetcher::{append_stats_history, FetchOrchestrator, RunStats};
use thread_digest::models::Post;
use thread_digest::source::HttpPostSource;

/// Document written to the output file or stdout.
#[derive(Serialize)]
struct Digest<'a> {
    posts: &'a [Post],
    stats: &'a RunStats,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    info!("Starting thread-digest");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        api_base_url = %config.api_base_url,
        cookies_file = %config.cookies_file.display(),
        "Configuration loaded"
    );

    let source = HttpPostSource::connect(&config.source_settings())
        .context("Failed to initialize API session")?;
    let source = Arc::new(source);

    let accounts = resolve_accounts(source.as_ref(), &config.account_sources()).await;
    if accounts.is_empty() {
        warn!("No valid accounts resolved, nothing to fetch");
    }
    info!(
        accounts = accounts.len(),
        posts_per_account = config.posts_per_account,
        "Accounts resolved"
    );

    let orchestrator = FetchOrchestrator::new(source, config.fetch_settings());
    let output = orchestrator
        .run(&accounts, config.posts_per_account, config.concurrency)
        .await
        .context("Fetch run aborted")?;

    if output.posts.is_empty() {
        warn!("No posts fetched");
    }

    let digest = Digest {
        posts: &output.posts,
        stats: &output.stats,
    };
    let json = serde_json::to_string_pretty(&digest).context("Failed to serialize digest")?;
    if let Some(path) = &config.output_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write digest: {}", path.display()))?;
        info!(path = %path.display(), posts = output.posts.len(), "Digest written");
    } else {
        println!("{json}");
    }

    if let Some(path) = &config.stats_file {
        match append_stats_history(path, &output.stats, config.stats_history_limit).await {
            Ok(()) => info!(path = %path.display(), "Stats saved"),
            Err(e) => warn!("Failed to save stats: {e:#}"),
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,thread_digest=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    // Logs go to stderr so stdout carries only the digest
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
