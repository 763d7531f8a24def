//! The seam between the client and the REST transport

use crate::error::HttpResult;
use crate::request::{Method, Request, Response};
use async_trait::async_trait;

/// Something that can execute REST calls
///
/// [`crate::RestClient`] is the production implementation; tests can swap
/// in their own.
#[async_trait]
pub trait Requester: Send + Sync {
    /// Execute `request` with the method it carries
    async fn execute(&self, request: Request) -> HttpResult<Response>;

    async fn get(&self, request: Request) -> HttpResult<Response> {
        self.execute(request.method(Method::Get)).await
    }

    async fn post(&self, request: Request) -> HttpResult<Response> {
        self.execute(request.method(Method::Post)).await
    }

    async fn patch(&self, request: Request) -> HttpResult<Response> {
        self.execute(request.method(Method::Patch)).await
    }

    async fn put(&self, request: Request) -> HttpResult<Response> {
        self.execute(request.method(Method::Put)).await
    }

    async fn delete(&self, request: Request) -> HttpResult<Response> {
        self.execute(request.method(Method::Delete)).await
    }
}
