//! Run statistics shared by concurrently running account pipelines.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

/// Terminal snapshot of a fetch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub total_accounts: usize,
    pub successful_accounts: usize,
    pub failed_accounts: usize,
    pub total_posts: usize,
    pub filtered_old_posts: usize,
    pub threads_detected: usize,
    pub errors: Vec<String>,
}

impl RunStats {
    /// Percentage of accounts fetched successfully, `None` for an empty run.
    #[must_use]
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_accounts == 0 {
            return None;
        }
        Some(self.successful_accounts as f64 / self.total_accounts as f64 * 100.0)
    }
}

/// What one account pipeline contributes to the run statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountReport {
    pub kept_posts: usize,
    pub filtered_old: usize,
    pub threads_detected: usize,
}

/// Single owner of the run's [`RunStats`].
///
/// Every mutation goes through one of the methods below and is applied under
/// the lock; the lock is never held across an await point.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    inner: Mutex<RunStats>,
}

impl StatsRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_total_accounts(&self, total: usize) {
        self.inner.lock().await.total_accounts = total;
    }

    /// Record a completed account pipeline.
    pub async fn record_success(&self, report: AccountReport) {
        let mut stats = self.inner.lock().await;
        stats.successful_accounts += 1;
        stats.total_posts += report.kept_posts;
        stats.filtered_old_posts += report.filtered_old;
        stats.threads_detected += report.threads_detected;
    }

    /// Record an account whose fetch failed for good.
    pub async fn record_failure(&self, account: &str, cause: &str) {
        let mut stats = self.inner.lock().await;
        stats.failed_accounts += 1;
        stats.errors.push(format!("@{account}: {cause}"));
    }

    pub async fn snapshot(&self) -> RunStats {
        self.inner.lock().await.clone()
    }
}

/// One entry of the stats history file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsHistoryEntry {
    pub timestamp: String,
    #[serde(flatten)]
    pub stats: RunStats,
}

/// Append `stats` to the JSON history at `path`, keeping the newest `limit` entries.
///
/// # Errors
///
/// Returns an error if the history file exists but cannot be read or parsed,
/// or if the updated history cannot be written.
pub async fn append_stats_history(path: &Path, stats: &RunStats, limit: usize) -> Result<()> {
    let mut history: Vec<StatsHistoryEntry> = match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse stats history: {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            return Err(anyhow::Error::new(e))
                .context(format!("Failed to read stats history: {}", path.display()));
        }
    };

    history.push(StatsHistoryEntry {
        timestamp: Utc::now().to_rfc3339(),
        stats: stats.clone(),
    });
    let excess = history.len().saturating_sub(limit.max(1));
    history.drain(..excess);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create stats directory: {}", parent.display())
        })?;
    }

    let json = serde_json::to_vec_pretty(&history).context("Failed to serialize stats history")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write stats history: {}", path.display()))?;

    debug!(path = %path.display(), entries = history.len(), "Stats history updated");
    Ok(())
}
