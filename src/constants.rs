//! Shared constants used across the application.

/// User agent string sent with every API request.
///
/// A realistic browser user agent; the session cookies were issued to a browser
/// and the API rejects requests whose agent looks scripted.
pub const CLIENT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Base of public post URLs: `{POST_URL_BASE}/{handle}/status/{id}`.
pub const POST_URL_BASE: &str = "https://x.com";

/// Offset of the display timezone (UTC+8), in seconds.
pub const DISPLAY_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Display format for post timestamps.
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Separator placed between the texts of a merged thread.
pub const THREAD_SEPARATOR: &str = "\n---\n";

/// Build the public URL of a post.
#[must_use]
pub fn post_url(handle: &str, id: &str) -> String {
    format!("{POST_URL_BASE}/{handle}/status/{id}")
}
