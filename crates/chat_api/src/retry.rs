use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Maximum attempts for the most-recent-session lookup.
pub const MAX_LOOKUP_ATTEMPTS: u32 = 3;
/// Base delay; the wait before attempt N is `base * N`.
pub const LOOKUP_BASE_DELAY_MS: u64 = 500;

fn transient_error_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)timed?.?out|connection.?refused|connection.?reset|temporarily.?unavailable|service.?unavailable|rate.?limit")
            .expect("retry regex must compile")
    })
}

/// Transient-failure policy for the session lookup.
pub fn is_transient_lookup_error(status: Option<u16>, error_text: &str) -> bool {
    matches!(status, Some(429 | 500 | 502 | 503 | 504))
        || transient_error_regex().is_match(error_text)
}

/// Delay before retrying lookup attempt `attempt` (1-based).
pub fn lookup_retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(LOOKUP_BASE_DELAY_MS * u64::from(attempt.max(1)))
}
