//! Concurrent per-account fetch pipelines.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::age_filter::AgeFilter;
use super::hydrate::{Budget, ThreadContentFetcher};
use super::merge::merge_threads;
use super::stats::{AccountReport, RunStats, StatsRecorder};
use super::threads::resolve_chains;
use super::FetchSettings;
use crate::models::Post;
use crate::source::{PostSource, SourceError};

/// Posts of every account in submission order, with the run statistics.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub posts: Vec<Post>,
    pub stats: RunStats,
}

/// Runs one fetch pipeline per account under a concurrency bound.
pub struct FetchOrchestrator {
    source: Arc<dyn PostSource>,
    settings: FetchSettings,
}

impl FetchOrchestrator {
    #[must_use]
    pub fn new(source: Arc<dyn PostSource>, settings: FetchSettings) -> Self {
        Self { source, settings }
    }

    /// Fetch, filter and thread-merge the posts of every account.
    ///
    /// Account failures are recorded in the returned statistics and never stop
    /// the other accounts.
    ///
    /// # Errors
    ///
    /// Returns the first fatal source error (uninitialized session); outstanding
    /// account tasks are aborted.
    pub async fn run(
        &self,
        accounts: &[String],
        posts_per_account: usize,
        concurrency: usize,
    ) -> Result<RunOutput, SourceError> {
        let stats = Arc::new(StatsRecorder::new());
        stats.set_total_accounts(accounts.len()).await;

        let concurrency = concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let total = accounts.len();
        info!(accounts = total, concurrency, "Starting batch fetch");

        let mut handles = Vec::with_capacity(total);
        for (index, account) in accounts.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let source = Arc::clone(&self.source);
            let settings = self.settings.clone();
            let stats = Arc::clone(&stats);
            let task_account = account.clone();

            let handle = tokio::spawn(async move {
                // The semaphore is never closed, so acquiring only waits.
                let _permit = semaphore.acquire_owned().await.ok();
                info!(
                    account = %task_account,
                    "[{}/{total}] Fetching account",
                    index + 1
                );
                let result = process_account(
                    source.as_ref(),
                    &settings,
                    &task_account,
                    posts_per_account,
                    &stats,
                )
                .await;
                // Pace outbound requests before handing the slot on.
                tokio::time::sleep(settings.request_delay).await;
                result
            });
            handles.push((account.clone(), handle));
        }

        let mut posts = Vec::new();
        let mut pending = handles.into_iter();
        while let Some((account, handle)) = pending.next() {
            match handle.await {
                Ok(Ok(account_posts)) => posts.extend(account_posts),
                Ok(Err(e)) => {
                    error!(account = %account, error = %e, "Fatal source error, aborting run");
                    for (_, rest) in pending.by_ref() {
                        rest.abort();
                    }
                    return Err(e);
                }
                Err(e) => {
                    error!(account = %account, "Fetch task panicked: {e}");
                    stats
                        .record_failure(&account, &format!("fetch task failed: {e}"))
                        .await;
                }
            }
        }

        let stats = stats.snapshot().await;
        info!(
            total = stats.total_accounts,
            successful = stats.successful_accounts,
            failed = stats.failed_accounts,
            posts = stats.total_posts,
            threads = stats.threads_detected,
            success_rate = ?stats.success_rate().map(|r| format!("{r:.1}%")),
            "Batch fetch complete"
        );

        Ok(RunOutput { posts, stats })
    }
}

/// Fetch, filter and merge threads for one account.
///
/// Only fatal errors are returned; anything else is recorded as an account
/// failure and yields no posts.
async fn process_account(
    source: &dyn PostSource,
    settings: &FetchSettings,
    account: &str,
    count: usize,
    stats: &StatsRecorder,
) -> Result<Vec<Post>, SourceError> {
    let raw = match settings.retry.fetch_recent(source, account, count).await {
        Ok(raw) => raw,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(account = %account, error = %e, "Fetch failed");
            stats.record_failure(account, &e.to_string()).await;
            return Ok(Vec::new());
        }
    };

    let outcome = AgeFilter::new(settings.max_post_age_hours).filter(account, &raw, Utc::now());
    if outcome.filtered_old > 0 {
        info!(
            account = %account,
            filtered = outcome.filtered_old,
            max_age_hours = settings.max_post_age_hours,
            "Dropped old posts"
        );
    }

    let mut posts = outcome.kept;
    let mut threads_detected = 0;
    if settings.enable_thread_merging && !posts.is_empty() {
        let chains = resolve_chains(&raw);
        if !chains.is_empty() {
            info!(account = %account, threads = chains.len(), "Detected threads");
            let hydration = ThreadContentFetcher::new(source, settings.request_delay)
                .hydrate(
                    account,
                    &chains,
                    &raw,
                    Budget::new(settings.max_thread_fetches),
                )
                .await;
            threads_detected = hydration.threads_detected;
            posts = merge_threads(posts, &chains, &hydration.threads);
        }
    }

    info!(account = %account, posts = posts.len(), "Fetched posts");
    stats
        .record_success(AccountReport {
            kept_posts: posts.len(),
            filtered_old: outcome.filtered_old,
            threads_detected,
        })
        .await;

    Ok(posts)
}
