//! Retry schedule and `Retry-After` handling for metadata API calls.

use std::time::Duration;

use tracing::debug;

/// Fixed delays before each attempt. The first attempt is immediate.
pub const DEFAULT_RETRY_DELAYS: [Duration; 3] = [
    Duration::ZERO,
    Duration::from_secs(1),
    Duration::from_secs(2),
];

/// Upper bound on a server-supplied `Retry-After` wait.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Statuses the metadata API uses for throttling or temporary failure.
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 403 | 429) || (500..600).contains(&status)
}

/// Parses a `Retry-After` value as (possibly fractional) seconds or an HTTP-date.
///
/// Negative, unparseable or past values yield `None`. Waits are capped at
/// [`MAX_RETRY_AFTER`].
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            debug!(header_value, "ignoring invalid Retry-After seconds");
            return None;
        }
        let capped = seconds.min(MAX_RETRY_AFTER.as_secs_f64());
        return Some(Duration::from_secs_f64(capped));
    }

    let datetime = httpdate::parse_http_date(header_value).ok()?;
    match datetime.duration_since(std::time::SystemTime::now()) {
        Ok(duration) => Some(duration.min(MAX_RETRY_AFTER)),
        Err(_) => {
            debug!(header_value, "Retry-After date is in the past");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(403));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(400));
    }

    #[test]
    fn test_parse_retry_after_integer_and_fraction() {
        assert_eq!(parse_retry_after("3"), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after(" 1.5 "), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_parse_retry_after_rejects_negative_and_garbage() {
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn test_parse_retry_after_caps_large_values() {
        assert_eq!(parse_retry_after("86400"), Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn test_parse_retry_after_past_http_date_is_none() {
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_default_schedule_is_zero_one_two_seconds() {
        let secs: Vec<u64> = DEFAULT_RETRY_DELAYS.iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![0, 1, 2]);
    }
}
