//! # guildlink-http
//!
//! REST boundary of the client. [`Requester`] is the seam the client calls
//! through; [`RestClient`] implements it on `reqwest`, sharing the
//! [`guildlink_common::RateLimiter`] with the gateway.

pub mod client;
pub mod error;
pub mod headers;
pub mod request;
pub mod requester;
pub mod resources;
pub mod routes;

pub use client::RestClient;
pub use error::{HttpError, HttpResult};
pub use request::{Method, Request, Response};
pub use requester::Requester;
pub use resources::{GatewayBot, SessionStartLimit};
