//! Rate-limited REST client

use crate::error::{HttpError, HttpResult};
use crate::headers::{RateLimitBody, RateLimitHeaders};
use crate::request::{Request, Response};
use crate::requester::Requester;
use async_trait::async_trait;
use guildlink_common::{ClientConfig, RateLimiter};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

const AUDIT_LOG_REASON: &str = "x-audit-log-reason";

/// Attempts per call when the server keeps answering 429
const MAX_ATTEMPTS: u32 = 3;

/// Fallback wait when a 429 names no retry time
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// REST client honoring the shared rate limiter
///
/// Every call reserves its bucket first, then feeds the response's rate
/// limit headers back into the limiter. A 429 marks the bucket (or every
/// bucket, when global) as exhausted and the call is retried, unless the
/// limiter is in cancel mode.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    limiter: Arc<RateLimiter>,
}

impl RestClient {
    pub fn new(config: &ClientConfig, limiter: Arc<RateLimiter>) -> HttpResult<Self> {
        let mut auth = HeaderValue::from_str(&authorization(&config.bot_token))
            .map_err(|e| HttpError::Config(format!("bot token is not a valid header: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent(&config.project_name))
            .timeout(config.http_timeout);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            limiter,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send_once(&self, request: &Request) -> HttpResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, request.endpoint);
        let mut builder = self.http.request(request.method.into(), url);
        if let Some(content_type) = &request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type.as_str());
        }
        if let Some(reason) = &request.reason {
            builder = builder.header(AUDIT_LOG_REASON, reason.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        Ok(builder.send().await?)
    }

    /// Record bucket state from a response
    fn observe(&self, key: &str, headers: &RateLimitHeaders) {
        if let Some((remaining, reset_after)) = headers.bucket_state() {
            self.limiter
                .update_from_response(key, remaining, Instant::now() + reset_after, headers.limit);
        }
    }
}

#[async_trait]
impl Requester for RestClient {
    async fn execute(&self, request: Request) -> HttpResult<Response> {
        let key = request.rate_limit_key.as_str();
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.limiter.acquire(key).await?;

            trace!(method = %request.method, endpoint = %request.endpoint, key = %key, "Sending request");
            let response = self.send_once(&request).await?;
            let status = response.status();
            let headers = RateLimitHeaders::parse(response.headers());
            self.observe(key, &headers);
            let body = response.bytes().await?.to_vec();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let limited: RateLimitBody = serde_json::from_slice(&body).unwrap_or_default();
                let retry_after = headers
                    .reset_after
                    .or_else(|| limited.retry_after())
                    .or(headers.retry_after)
                    .unwrap_or(DEFAULT_RETRY_AFTER);
                let global = headers.global || limited.global;
                self.limiter.rate_limited(key, retry_after, global);

                if attempt < MAX_ATTEMPTS {
                    // Cancel mode surfaces the wait from acquire on the next pass
                    warn!(
                        key = %key,
                        attempt,
                        retry_after_ms = retry_after.as_millis() as u64,
                        global,
                        "Request rate limited, retrying"
                    );
                    continue;
                }
            }

            if !status.is_success() {
                return Err(HttpError::Status {
                    method: request.method.as_str(),
                    endpoint: request.endpoint.clone(),
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }

            debug!(
                method = %request.method,
                endpoint = %request.endpoint,
                status = status.as_u16(),
                "Request completed"
            );
            return Ok(Response {
                status: status.as_u16(),
                body,
            });
        }
    }
}

/// `Authorization` value; bare tokens get the `Bot` scheme
fn authorization(token: &str) -> String {
    if token.starts_with("Bot ") || token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("Bot {token}")
    }
}

fn user_agent(project_name: &str) -> String {
    let base = format!(
        "DiscordBot (https://github.com/guildlink/guildlink, {})",
        env!("CARGO_PKG_VERSION")
    );
    if project_name.is_empty() {
        base
    } else {
        format!("{base} {project_name}")
    }
}
