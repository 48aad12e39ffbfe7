//! Fetching the full text of detected threads.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::age_filter::parse_timestamp;
use super::threads::ThreadChain;
use crate::source::{PostSource, RawPost};

/// Remaining number of remote thread fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget(usize);

impl Budget {
    #[must_use]
    pub const fn new(fetches: usize) -> Self {
        Self(fetches)
    }

    #[must_use]
    pub const fn remaining(self) -> usize {
        self.0
    }

    #[must_use]
    pub const fn is_exhausted(self) -> bool {
        self.0 == 0
    }

    /// Split off quota for up to `wanted` fetches.
    ///
    /// Returns how many fetches may run and the budget left afterwards. Every
    /// granted fetch is spent whether or not it succeeds.
    #[must_use]
    pub fn schedule(self, wanted: usize) -> (usize, Self) {
        let granted = wanted.min(self.0);
        (granted, Self(self.0 - granted))
    }
}

/// Thread texts keyed by root id, plus what the hydration cost.
#[derive(Debug, Clone)]
pub struct Hydration {
    pub threads: HashMap<String, Vec<String>>,
    pub threads_detected: usize,
    pub remaining: Budget,
}

/// Hydrates thread chains from the source, falling back to the batch.
pub struct ThreadContentFetcher<'a> {
    source: &'a dyn PostSource,
    request_delay: Duration,
}

impl<'a> ThreadContentFetcher<'a> {
    #[must_use]
    pub fn new(source: &'a dyn PostSource, request_delay: Duration) -> Self {
        Self {
            source,
            request_delay,
        }
    }

    /// Hydrate `chains` in order while `budget` lasts.
    ///
    /// Chains beyond the budget are left out of the result and therefore
    /// stay unmerged. A failed or empty remote fetch falls back to the posts
    /// of `batch`; a chain yielding no text either way is skipped.
    pub async fn hydrate(
        &self,
        account: &str,
        chains: &[ThreadChain],
        batch: &[RawPost],
        budget: Budget,
    ) -> Hydration {
        let (granted, remaining) = budget.schedule(chains.len());
        if granted < chains.len() {
            info!(
                account = %account,
                skipped = chains.len() - granted,
                "Thread fetch budget exhausted, leaving remaining threads unmerged"
            );
        }

        let mut threads = HashMap::new();
        for chain in &chains[..granted] {
            let root_id = chain.root_id.as_str();
            let remote = self.source.fetch_chain_by_root_id(root_id).await;
            tokio::time::sleep(self.request_delay).await;

            let texts = match remote {
                Ok(posts) if !posts.is_empty() => {
                    debug!(account = %account, root_id = %root_id, len = posts.len(), "Fetched thread");
                    posts.into_iter().map(|p| p.text).collect()
                }
                Ok(_) => {
                    debug!(account = %account, root_id = %root_id, "Remote thread empty, using local fallback");
                    local_thread_texts(chain, batch)
                }
                Err(e) => {
                    warn!(account = %account, root_id = %root_id, error = %e, "Thread fetch failed, using local fallback");
                    local_thread_texts(chain, batch)
                }
            };

            if texts.is_empty() {
                debug!(account = %account, root_id = %root_id, "No thread content, skipping");
                continue;
            }
            threads.insert(chain.root_id.clone(), texts);
        }

        Hydration {
            threads_detected: threads.len(),
            threads,
            remaining,
        }
    }
}

/// Rebuild a thread from the batch members of `chain`, oldest first.
///
/// Members without a readable time sort first.
#[must_use]
pub fn local_thread_texts(chain: &ThreadChain, batch: &[RawPost]) -> Vec<String> {
    let index: HashMap<&str, &RawPost> = batch.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut members: Vec<&RawPost> = chain
        .member_ids
        .iter()
        .filter_map(|id| index.get(id.as_str()).copied())
        .collect();
    members.sort_by_key(|p| p.created_at.as_ref().and_then(parse_timestamp));

    members.into_iter().map(|p| p.text.clone()).collect()
}
