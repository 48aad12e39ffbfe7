use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::post_url;

/// One fetched post, ready for downstream summarization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "accountHandle")]
    pub account: String,
    pub text: String,
    /// Creation time rendered in the display timezone, empty when unknown.
    pub created_at: String,
    /// Parsed creation time, when the source provided a readable one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
    pub like_count: u64,
    #[serde(rename = "repeatCount")]
    pub repost_count: u64,
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub is_merged: bool,
    /// Number of posts folded into this one, set only when merged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_length: Option<usize>,
}

impl Post {
    /// Fold a thread into this post, taking over the root's identity.
    #[must_use]
    pub fn into_merged(self, root_id: &str, texts: &[String], separator: &str) -> Self {
        Self {
            text: texts.join(separator),
            url: post_url(&self.account, root_id),
            id: root_id.to_string(),
            is_merged: true,
            merged_length: Some(texts.len()),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_merged_rewrites_identity() {
        let post = Post {
            account: "alice".to_string(),
            text: "second".to_string(),
            created_at: "2026-01-01 08:00".to_string(),
            posted_at: None,
            like_count: 3,
            repost_count: 1,
            id: "2".to_string(),
            url: post_url("alice", "2"),
            is_merged: false,
            merged_length: None,
        };

        let texts = vec!["first".to_string(), "second".to_string()];
        let merged = post.into_merged("1", &texts, " | ");

        assert_eq!(merged.text, "first | second");
        assert_eq!(merged.id, "1");
        assert_eq!(merged.url, "https://x.com/alice/status/1");
        assert!(merged.is_merged);
        assert_eq!(merged.merged_length, Some(2));
        assert_eq!(merged.like_count, 3);
    }

    #[test]
    fn test_unmerged_post_omits_merged_length() {
        let post = Post {
            account: "bob".to_string(),
            text: "hi".to_string(),
            created_at: String::new(),
            posted_at: None,
            like_count: 0,
            repost_count: 0,
            id: "9".to_string(),
            url: post_url("bob", "9"),
            is_merged: false,
            merged_length: None,
        };

        let json = serde_json::to_value(&post).unwrap();
        assert!(json.get("mergedLength").is_none());
        assert!(json.get("postedAt").is_none());
        assert_eq!(json["isMerged"], false);
        assert_eq!(json["accountHandle"], "bob");
        assert_eq!(json["repeatCount"], 0);
        assert_eq!(json["likeCount"], 0);
    }
}
