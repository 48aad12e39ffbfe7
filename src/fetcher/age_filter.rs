//! Age filtering and timestamp normalization.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeDelta, Utc};

use crate::constants::{post_url, DISPLAY_TIME_FORMAT, DISPLAY_UTC_OFFSET_SECS};
use crate::models::Post;
use crate::source::{RawPost, RawTimestamp};

/// Textual timestamp format used by the API: `Wed Oct 10 20:19:24 +0000 2018`.
const API_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Lenient fallback, applied to the first 19 characters and read as UTC.
const FALLBACK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Posts surviving the age filter, plus how many were dropped.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub kept: Vec<Post>,
    pub filtered_old: usize,
}

/// Drops posts older than a fixed age.
#[derive(Debug, Clone, Copy)]
pub struct AgeFilter {
    max_age_hours: i64,
}

impl AgeFilter {
    #[must_use]
    pub fn new(max_age_hours: u64) -> Self {
        Self {
            max_age_hours: i64::try_from(max_age_hours).unwrap_or(i64::MAX),
        }
    }

    /// Convert `posts` fetched for `account` into [`Post`]s, dropping reposts
    /// and anything created strictly before `now - max_age`.
    ///
    /// Posts without a readable timestamp are kept with an empty display time.
    #[must_use]
    pub fn filter(&self, account: &str, posts: &[RawPost], now: DateTime<Utc>) -> FilterOutcome {
        let cutoff = TimeDelta::try_hours(self.max_age_hours)
            .and_then(|age| now.checked_sub_signed(age));

        let mut outcome = FilterOutcome::default();
        for raw in posts.iter().filter(|p| !p.is_repost) {
            let posted_at = raw.created_at.as_ref().and_then(parse_timestamp);

            if let (Some(posted_at), Some(cutoff)) = (posted_at, cutoff) {
                if posted_at < cutoff {
                    outcome.filtered_old += 1;
                    continue;
                }
            }

            outcome.kept.push(Post {
                account: account.to_string(),
                text: raw.text.clone(),
                created_at: posted_at.map(format_display_time).unwrap_or_default(),
                posted_at,
                like_count: raw.like_count,
                repost_count: raw.repost_count,
                id: raw.id.clone(),
                url: post_url(account, &raw.id),
                is_merged: false,
                merged_length: None,
            });
        }

        outcome
    }
}

/// Parse a source timestamp, returning `None` for anything unrecognized.
#[must_use]
pub fn parse_timestamp(raw: &RawTimestamp) -> Option<DateTime<Utc>> {
    match raw {
        RawTimestamp::Structured(t) => Some(*t),
        RawTimestamp::Text(text) => parse_text_timestamp(text),
    }
}

fn parse_text_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_str(text, API_TIME_FORMAT) {
        return Some(t.with_timezone(&Utc));
    }
    let head = text.get(..19).unwrap_or(text);
    NaiveDateTime::parse_from_str(head, FALLBACK_TIME_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}

/// Render a time in the display timezone.
#[must_use]
pub fn format_display_time(t: DateTime<Utc>) -> String {
    let offset = FixedOffset::east_opt(DISPLAY_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    t.with_timezone(&offset)
        .format(DISPLAY_TIME_FORMAT)
        .to_string()
}
