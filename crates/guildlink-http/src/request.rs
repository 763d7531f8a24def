//! Request and response values passed through a [`crate::Requester`]

use crate::error::HttpResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Patch => Self::PATCH,
            Method::Put => Self::PUT,
            Method::Delete => Self::DELETE,
        }
    }
}

/// A REST call
///
/// `rate_limit_key` names the bucket the call is accounted under; calls
/// sharing a key wait on each other.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Request {
    pub method: Method,
    pub rate_limit_key: String,
    /// Path below the API base URL, starting with `/`
    pub endpoint: String,
    pub body: Option<Vec<u8>>,
    pub content_type: Option<String>,
    /// Audit log reason header
    pub reason: Option<String>,
}

impl Request {
    pub fn new(rate_limit_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            rate_limit_key: rate_limit_key.into(),
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> HttpResult<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        self.content_type = Some("application/json".to_string());
        Ok(self)
    }

    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// A successful response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn json<T: DeserializeOwned>(&self) -> HttpResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
