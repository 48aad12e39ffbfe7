//! The post source capability consumed by the fetch engine.
//!
//! The engine never talks to the network directly; it only sees a
//! [`PostSource`]. [`http::HttpPostSource`] is the production implementation.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use http::{HttpPostSource, SourceSettings};

/// Errors returned by a [`PostSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("session not initialized: {0}")]
    NotInitialized(String),
    #[error("Unauthorized (401): {0}")]
    Unauthorized(String),
    #[error("Rate limited (429): {0}")]
    RateLimited(String),
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

impl SourceError {
    /// Whether this error must abort the whole run.
    ///
    /// Only a session that never came up is fatal; a 401 on one account
    /// (protected or suspended) is an ordinary account failure.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotInitialized(_))
    }

    /// Whether this error signals rate limiting and is worth retrying.
    ///
    /// Only the status code and the response body are inspected, never URLs
    /// or transport error text.
    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::Api { status, message } => *status == 429 || is_rate_limit_message(message),
            Self::NotInitialized(_)
            | Self::Unauthorized(_)
            | Self::Network(_)
            | Self::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Check if an API response body carries a rate-limit signature.
fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("try again later")
}

/// Creation time as the source reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTimestamp {
    /// Already a point in time.
    Structured(DateTime<Utc>),
    /// Textual form, parsed later by the age filter.
    Text(String),
}

/// Reply metadata extracted once per post at ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyContext {
    pub target_id: Option<String>,
    pub target_author_id: Option<String>,
}

/// A post exactly as the source delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPost {
    pub id: String,
    pub author_handle: String,
    pub author_id: String,
    pub text: String,
    pub created_at: Option<RawTimestamp>,
    pub like_count: u64,
    pub repost_count: u64,
    pub reply: ReplyContext,
    /// Set when the post is a plain repost of someone else's post.
    pub is_repost: bool,
}

/// Authenticated access to an upstream social feed.
///
/// Implementations need not tolerate unbounded concurrent use; the
/// orchestrator bounds the number of in-flight calls.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Fetch the most recent `count` posts of `handle`.
    async fn fetch_recent_posts(&self, handle: &str, count: usize)
        -> Result<Vec<RawPost>, SourceError>;

    /// Fetch the self-reply chain rooted at `root_id`, in source order.
    ///
    /// An empty list means the source knows of no chain.
    async fn fetch_chain_by_root_id(&self, root_id: &str) -> Result<Vec<RawPost>, SourceError>;

    /// Fetch the handles `handle` follows.
    async fn fetch_following(&self, handle: &str) -> Result<Vec<String>, SourceError>;
}
