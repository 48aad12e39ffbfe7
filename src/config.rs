use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::accounts::AccountSources;
use crate::fetcher::{FetchSettings, RetryPolicy};
use crate::source::SourceSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // API session
    pub api_base_url: String,
    pub cookies_file: PathBuf,
    pub bearer_token: Option<String>,
    pub proxy_url: Option<String>,
    pub request_timeout: Duration,

    // Accounts
    pub accounts: Vec<String>,
    pub accounts_file: Option<PathBuf>,
    pub following_of: Option<String>,

    // Fetching
    pub posts_per_account: usize,
    pub concurrency: usize,
    pub request_delay: Duration,
    pub retry_on_rate_limit: bool,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub max_post_age_hours: u64,

    // Threads
    pub enable_thread_merging: bool,
    pub max_thread_fetches: usize,

    // Output
    pub output_file: Option<PathBuf>,
    pub stats_file: Option<PathBuf>,
    pub stats_history_limit: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // API session
            api_base_url: env_or_default("API_BASE_URL", "https://api.twitter.com/1.1"),
            cookies_file: PathBuf::from(env_or_default("COOKIES_FILE", "cookies.json")),
            bearer_token: optional_env("BEARER_TOKEN"),
            proxy_url: optional_env("PROXY_URL"),
            request_timeout: Duration::from_secs(parse_env_u64("REQUEST_TIMEOUT_SECS", 30)?),

            // Accounts
            accounts: parse_list(&env_or_default("ACCOUNTS", "")),
            accounts_file: optional_env("ACCOUNTS_FILE").map(PathBuf::from),
            following_of: optional_env("FOLLOWING_OF"),

            // Fetching
            posts_per_account: parse_env_usize("POSTS_PER_ACCOUNT", 5)?,
            concurrency: parse_env_usize("CONCURRENCY", 2)?,
            request_delay: Duration::from_secs(parse_env_u64("REQUEST_DELAY_SECS", 2)?),
            retry_on_rate_limit: parse_env_bool("RETRY_ON_RATE_LIMIT", true)?,
            max_retries: parse_env_u32("MAX_RETRIES", 3)?,
            retry_backoff: Duration::from_secs(parse_env_u64("RETRY_BACKOFF_SECS", 30)?),
            max_post_age_hours: parse_env_u64("MAX_POST_AGE_HOURS", 9)?,

            // Threads
            enable_thread_merging: parse_env_bool("ENABLE_THREAD_MERGING", true)?,
            max_thread_fetches: parse_env_usize("MAX_THREAD_FETCHES", 3)?,

            // Output
            output_file: optional_env("OUTPUT_FILE").map(PathBuf::from),
            stats_file: match std::env::var("STATS_FILE") {
                Ok(val) if val.is_empty() => None,
                Ok(val) => Some(PathBuf::from(val)),
                Err(_) => Some(PathBuf::from("logs/stats.json")),
            },
            stats_history_limit: parse_env_usize("STATS_HISTORY_LIMIT", 30)?,
        })
    }

    /// Deterministic configuration for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:9/1.1".to_string(),
            cookies_file: PathBuf::from("cookies.json"),
            bearer_token: None,
            proxy_url: None,
            request_timeout: Duration::from_secs(5),
            accounts: vec!["sama".to_string()],
            accounts_file: None,
            following_of: None,
            posts_per_account: 5,
            concurrency: 2,
            request_delay: Duration::ZERO,
            retry_on_rate_limit: true,
            max_retries: 3,
            retry_backoff: Duration::from_secs(30),
            max_post_age_hours: 9,
            enable_thread_merging: true,
            max_thread_fetches: 3,
            output_file: None,
            stats_file: None,
            stats_history_limit: 30,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.posts_per_account == 0 {
            return Err(ConfigError::InvalidValue {
                name: "POSTS_PER_ACCOUNT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.stats_history_limit == 0 {
            return Err(ConfigError::InvalidValue {
                name: "STATS_HISTORY_LIMIT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.following_of.is_none() && self.accounts_file.is_none() && self.accounts.is_empty() {
            return Err(ConfigError::MissingEnvVar(
                "ACCOUNTS (or ACCOUNTS_FILE / FOLLOWING_OF)".to_string(),
            ));
        }
        if let Err(e) = url::Url::parse(&self.api_base_url) {
            return Err(ConfigError::InvalidValue {
                name: "API_BASE_URL".to_string(),
                message: e.to_string(),
            });
        }
        Ok(())
    }

    /// Settings for opening the API session.
    #[must_use]
    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            base_url: self.api_base_url.clone(),
            cookies_file: self.cookies_file.clone(),
            bearer_token: self.bearer_token.clone(),
            proxy_url: self.proxy_url.clone(),
            timeout: self.request_timeout,
        }
    }

    /// Settings for the per-account fetch pipeline.
    #[must_use]
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            request_delay: self.request_delay,
            retry: RetryPolicy {
                retry_on_rate_limit: self.retry_on_rate_limit,
                max_retries: self.max_retries,
                backoff: self.retry_backoff,
            },
            max_post_age_hours: self.max_post_age_hours,
            enable_thread_merging: self.enable_thread_merging,
            max_thread_fetches: self.max_thread_fetches,
        }
    }

    /// Where to look for the account list.
    #[must_use]
    pub fn account_sources(&self) -> AccountSources {
        AccountSources {
            following_of: self.following_of.clone(),
            accounts_file: self.accounts_file.clone(),
            accounts: self.accounts.clone(),
        }
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
