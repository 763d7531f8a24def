//! Rate limit response headers

use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::time::Duration;

pub const REMAINING: &str = "x-ratelimit-remaining";
pub const RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const LIMIT: &str = "x-ratelimit-limit";
pub const GLOBAL: &str = "x-ratelimit-global";
pub const BUCKET: &str = "x-ratelimit-bucket";
pub const RETRY_AFTER: &str = "retry-after";

/// Rate limit state reported by one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub remaining: Option<u32>,
    pub reset_after: Option<Duration>,
    pub limit: Option<u32>,
    pub global: bool,
    pub bucket: Option<String>,
    /// Plain `Retry-After`, in seconds
    pub retry_after: Option<Duration>,
}

impl RateLimitHeaders {
    pub fn parse(headers: &HeaderMap) -> Self {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        let seconds = |name: &str| {
            text(name)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|s| s.is_finite() && *s >= 0.0)
                .map(Duration::from_secs_f64)
        };

        Self {
            remaining: text(REMAINING).and_then(|v| v.parse().ok()),
            reset_after: seconds(RESET_AFTER),
            limit: text(LIMIT).and_then(|v| v.parse().ok()),
            global: text(GLOBAL).is_some_and(|v| v.eq_ignore_ascii_case("true")),
            bucket: text(BUCKET).map(str::to_string),
            retry_after: seconds(RETRY_AFTER),
        }
    }

    /// Bucket state to record, when the response carried one
    pub fn bucket_state(&self) -> Option<(u32, Duration)> {
        Some((self.remaining?, self.reset_after?))
    }
}

/// Body of a 429 response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RateLimitBody {
    pub message: String,
    /// Seconds
    pub retry_after: f64,
    pub global: bool,
}

impl RateLimitBody {
    pub fn retry_after(&self) -> Option<Duration> {
        (self.retry_after.is_finite() && self.retry_after > 0.0)
            .then(|| Duration::from_secs_f64(self.retry_after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_parse_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(REMAINING, HeaderValue::from_static("0"));
        headers.insert(RESET_AFTER, HeaderValue::from_static("1.250"));
        headers.insert(LIMIT, HeaderValue::from_static("5"));
        headers.insert(BUCKET, HeaderValue::from_static("abcd"));

        let parsed = RateLimitHeaders::parse(&headers);
        assert_eq!(parsed.bucket_state(), Some((0, Duration::from_millis(1250))));
        assert_eq!(parsed.limit, Some(5));
        assert_eq!(parsed.bucket.as_deref(), Some("abcd"));
        assert!(!parsed.global);
    }

    #[test]
    fn test_missing_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(REMAINING, HeaderValue::from_static("3"));
        headers.insert(GLOBAL, HeaderValue::from_static("true"));

        let parsed = RateLimitHeaders::parse(&headers);
        assert_eq!(parsed.bucket_state(), None);
        assert!(parsed.global);
    }

    #[test]
    fn test_rate_limit_body() {
        let body: RateLimitBody =
            serde_json::from_str(r#"{"message":"You are being rate limited.","retry_after":0.5,"global":false}"#)
                .unwrap();
        assert_eq!(body.retry_after(), Some(Duration::from_millis(500)));
        assert_eq!(RateLimitBody::default().retry_after(), None);
    }
}
