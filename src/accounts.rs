//! Resolving the list of accounts to fetch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, warn};

use crate::source::PostSource;

static HANDLE_PATTERN: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,15}$").unwrap());

/// Where account handles may come from, in priority order.
#[derive(Debug, Clone, Default)]
pub struct AccountSources {
    /// Use the following list of this handle.
    pub following_of: Option<String>,
    /// File of handles: a JSON array, or one per line.
    pub accounts_file: Option<PathBuf>,
    /// Handles given inline.
    pub accounts: Vec<String>,
}

/// Resolve the accounts to fetch.
///
/// A failing source is logged and the next one is tried; the inline list is
/// the last resort.
pub async fn resolve_accounts(source: &dyn PostSource, sources: &AccountSources) -> Vec<String> {
    if let Some(owner) = sources.following_of.as_deref() {
        info!(owner = %owner, "Loading accounts from following list");
        match source.fetch_following(owner).await {
            Ok(following) if !following.is_empty() => {
                let accounts = normalize_handles(following);
                info!(count = accounts.len(), "Loaded followed accounts");
                return accounts;
            }
            Ok(_) => warn!(owner = %owner, "Following list is empty, falling back"),
            Err(e) => warn!(owner = %owner, error = %e, "Failed to load following list, falling back"),
        }
    }

    if let Some(path) = sources.accounts_file.as_deref() {
        match read_accounts_file(path).await {
            Ok(accounts) => return normalize_handles(accounts),
            Err(e) => warn!(path = %path.display(), "Failed to load accounts file: {e:#}"),
        }
    }

    normalize_handles(sources.accounts.clone())
}

/// Read handles from a JSON array or a line-per-handle file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, or looks like JSON but is not
/// an array of strings.
pub async fn read_accounts_file(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read accounts file: {}", path.display()))?;

    if content.trim_start().starts_with('[') {
        return serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse accounts file: {}", path.display()));
    }

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

/// Strip `@`, drop invalid handles and case-insensitive duplicates.
#[must_use]
pub fn normalize_handles(handles: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for raw in handles {
        let handle = raw.trim().trim_start_matches('@');
        if !HANDLE_PATTERN.is_match(handle) {
            warn!(handle = %raw, "Skipping invalid account handle");
            continue;
        }
        if seen.insert(handle.to_lowercase()) {
            result.push(handle.to_string());
        }
    }
    result
}
