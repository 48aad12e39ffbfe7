//! `PostSource` backed by a Twitter v1.1-compatible JSON API.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{PostSource, RawPost, RawTimestamp, ReplyContext, SourceError};
use crate::constants::CLIENT_USER_AGENT;

/// Connection settings for [`HttpPostSource`].
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub base_url: String,
    pub cookies_file: PathBuf,
    pub bearer_token: Option<String>,
    pub proxy_url: Option<String>,
    pub timeout: Duration,
}

/// Authenticated HTTP session against the post API.
pub struct HttpPostSource {
    client: reqwest::Client,
    base_url: Url,
    cookie_header: String,
    csrf_token: Option<String>,
    bearer_token: Option<String>,
}

impl std::fmt::Debug for HttpPostSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPostSource")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpPostSource {
    /// Open a session from the cookie file named in `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotInitialized`] if the cookie file is missing,
    /// holds no cookies for the API host, or the HTTP client cannot be built.
    pub fn connect(settings: &SourceSettings) -> Result<Self, SourceError> {
        let mut base_url = Url::parse(&settings.base_url).map_err(|e| {
            SourceError::NotInitialized(format!("invalid API base URL {}: {e}", settings.base_url))
        })?;
        // Url::join drops the last segment unless the path ends with a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let host = base_url.host_str().unwrap_or_default().to_string();

        let cookies = load_cookies(&settings.cookies_file, &host)?;
        if cookies.is_empty() {
            return Err(SourceError::NotInitialized(format!(
                "no cookies for {host} in {}",
                settings.cookies_file.display()
            )));
        }
        let csrf_token = cookies.get("ct0").cloned();
        let cookie_header = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");

        let mut builder = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(CLIENT_USER_AGENT);
        if let Some(proxy_url) = &settings.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| SourceError::NotInitialized(format!("invalid proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| SourceError::NotInitialized(format!("failed to build HTTP client: {e}")))?;

        debug!(
            base_url = %base_url,
            cookies = cookies.len(),
            "Post source session ready"
        );

        Ok(Self {
            client,
            base_url,
            cookie_header,
            csrf_token,
            bearer_token: settings.bearer_token.clone(),
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, SourceError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| SourceError::Parse(format!("invalid endpoint {path}: {e}")))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SourceError> {
        let mut request = self
            .client
            .get(url)
            .header(header::COOKIE, &self.cookie_header);
        if let Some(token) = &self.csrf_token {
            request = request.header("x-csrf-token", token);
        }
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited(body),
                StatusCode::UNAUTHORIZED => SourceError::Unauthorized(body),
                _ => SourceError::Api {
                    status: status.as_u16(),
                    message: body,
                },
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl PostSource for HttpPostSource {
    async fn fetch_recent_posts(
        &self,
        handle: &str,
        count: usize,
    ) -> Result<Vec<RawPost>, SourceError> {
        let count = count.to_string();
        let url = self.endpoint(
            "statuses/user_timeline.json",
            &[
                ("screen_name", handle),
                ("count", count.as_str()),
                ("tweet_mode", "extended"),
            ],
        )?;
        let statuses: Vec<WireStatus> = self.get_json(url).await?;
        Ok(statuses.into_iter().map(WireStatus::into_raw).collect())
    }

    async fn fetch_chain_by_root_id(&self, root_id: &str) -> Result<Vec<RawPost>, SourceError> {
        let url = self.endpoint(
            "statuses/show.json",
            &[
                ("id", root_id),
                ("include_thread", "true"),
                ("tweet_mode", "extended"),
            ],
        )?;
        let status: WireStatus = self.get_json(url).await?;
        Ok(status.thread.into_iter().map(WireStatus::into_raw).collect())
    }

    async fn fetch_following(&self, handle: &str) -> Result<Vec<String>, SourceError> {
        let url = self.endpoint(
            "friends/list.json",
            &[("screen_name", handle), ("count", "200")],
        )?;
        let list: WireUserList = self.get_json(url).await?;
        Ok(list.users.into_iter().map(|u| u.screen_name).collect())
    }
}

/// A status as returned by the API.
#[derive(Debug, Deserialize)]
struct WireStatus {
    id_str: String,
    full_text: Option<String>,
    text: Option<String>,
    created_at: Option<WireTimestamp>,
    favorite_count: Option<u64>,
    retweet_count: Option<u64>,
    in_reply_to_status_id_str: Option<String>,
    in_reply_to_user_id_str: Option<String>,
    user: WireUser,
    retweeted_status: Option<serde_json::Value>,
    #[serde(default)]
    thread: Vec<WireStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    EpochMillis(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id_str: String,
    screen_name: String,
}

#[derive(Debug, Deserialize)]
struct WireUserList {
    #[serde(default)]
    users: Vec<WireUser>,
}

impl WireStatus {
    fn into_raw(self) -> RawPost {
        let created_at = self.created_at.and_then(|ts| match ts {
            WireTimestamp::EpochMillis(ms) => {
                DateTime::from_timestamp_millis(ms).map(RawTimestamp::Structured)
            }
            WireTimestamp::Text(text) => Some(RawTimestamp::Text(text)),
        });

        RawPost {
            id: self.id_str,
            author_handle: self.user.screen_name,
            author_id: self.user.id_str,
            text: self.full_text.or(self.text).unwrap_or_default(),
            created_at,
            like_count: self.favorite_count.unwrap_or(0),
            repost_count: self.retweet_count.unwrap_or(0),
            reply: ReplyContext {
                target_id: self.in_reply_to_status_id_str.filter(|s| !s.is_empty()),
                target_author_id: self.in_reply_to_user_id_str.filter(|s| !s.is_empty()),
            },
            is_repost: self.retweeted_status.is_some(),
        }
    }
}

/// Load the cookies that apply to `domain` from a cookie file.
///
/// Accepts either a JSON object of `name: value` pairs (which applies to any
/// domain) or a Netscape `cookies.txt`.
fn load_cookies(path: &Path, domain: &str) -> Result<BTreeMap<String, String>, SourceError> {
    if !path.is_file() {
        return Err(SourceError::NotInitialized(format!(
            "cookie file not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        SourceError::NotInitialized(format!("failed to read {}: {e}", path.display()))
    })?;

    if let Ok(map) = serde_json::from_str::<BTreeMap<String, serde_json::Value>>(&content) {
        return Ok(map
            .into_iter()
            .filter_map(|(name, value)| match value {
                serde_json::Value::String(s) => Some((name, s)),
                serde_json::Value::Number(n) => Some((name, n.to_string())),
                _ => None,
            })
            .collect());
    }

    Ok(parse_netscape_cookies(&content, domain))
}

fn parse_netscape_cookies(content: &str, domain: &str) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() >= 7 {
            let cookie_domain = parts[0].trim_start_matches('.');
            if cookie_domain.ends_with(domain) || domain.ends_with(cookie_domain) {
                cookies.insert(parts[5].to_string(), parts[6].to_string());
            }
        }
    }
    cookies
}
