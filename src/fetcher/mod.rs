//! The fetch engine: retry, age filter, thread detection, hydration and merge.

pub mod age_filter;
pub mod hydrate;
pub mod merge;
pub mod orchestrator;
pub mod retry;
pub mod stats;
pub mod threads;

use std::time::Duration;

pub use age_filter::{AgeFilter, FilterOutcome};
pub use hydrate::{Budget, Hydration, ThreadContentFetcher};
pub use merge::merge_threads;
pub use orchestrator::{FetchOrchestrator, RunOutput};
pub use retry::RetryPolicy;
pub use stats::{append_stats_history, AccountReport, RunStats, StatsRecorder};
pub use threads::{resolve_chains, ReplyGraph, RootResolution, ThreadChain};

/// Knobs of the per-account pipeline.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Pause after every outbound request batch.
    pub request_delay: Duration,
    pub retry: RetryPolicy,
    pub max_post_age_hours: u64,
    pub enable_thread_merging: bool,
    /// Remote thread fetches allowed per account.
    pub max_thread_fetches: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_secs(2),
            retry: RetryPolicy::default(),
            max_post_age_hours: 9,
            enable_thread_merging: true,
            max_thread_fetches: 3,
        }
    }
}
