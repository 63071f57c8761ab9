//! The seam between API clients and the network
//!
//! Clients build a [Request] and hand it to a [Transport]. Transports own
//! connection handling, timeouts and TLS; they never interpret status codes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{Request, Response, TransportError};

mod http;
pub use http::*;

/// A [Transport] performs a single request against an agent and returns the
/// raw response, or a [TransportError] if no response could be obtained.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform `request` and return the agent's response
    async fn perform(&self, request: Request) -> Result<Response, TransportError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn perform(&self, request: Request) -> Result<Response, TransportError> {
        self.as_ref().perform(request).await
    }
}
