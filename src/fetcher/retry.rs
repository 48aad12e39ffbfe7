//! Retry with linear backoff on rate limiting.

use std::time::Duration;

use tracing::{debug, warn};

use crate::source::{PostSource, RawPost, SourceError};

/// How a single account fetch reacts to rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_on_rate_limit: bool,
    pub max_retries: u32,
    /// Wait before retry `n` (0-based) is `backoff * (n + 1)`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_on_rate_limit: true,
            max_retries: 3,
            backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait before the retry that follows attempt `attempt`.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt.saturating_add(1))
    }

    /// Fetch recent posts of `account`, retrying rate-limited attempts.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted, or the first error
    /// that is not a rate limit.
    pub async fn fetch_recent(
        &self,
        source: &dyn PostSource,
        account: &str,
        count: usize,
    ) -> Result<Vec<RawPost>, SourceError> {
        let mut attempt = 0;
        loop {
            debug!(account = %account, attempt, "Fetching recent posts");
            match source.fetch_recent_posts(account, count).await {
                Ok(posts) => return Ok(posts),
                Err(e)
                    if self.retry_on_rate_limit
                        && e.is_rate_limit()
                        && attempt < self.max_retries =>
                {
                    let wait = self.backoff_for(attempt);
                    warn!(
                        account = %account,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        wait_secs = wait.as_secs(),
                        "Rate limited, backing off before retry"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(0), Duration::from_secs(30));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(60));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(90));
    }
}
