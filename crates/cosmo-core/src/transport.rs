//! The `Transport` trait: a pluggable, synchronous-feeling request/response
//! exchange over HTTPS, surfacing only what the worker needs — the body and
//! one header bit.

use async_trait::async_trait;

use crate::error::CosmoError;

/// What the worker learns back from a single POST.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    /// `true` iff the response carried a `Retry-After: 0` header — the
    /// server's signal to poll again immediately, bypassing the normal
    /// cycle jitter.
    pub retry_after_zero: bool,
}

/// The transport every `cosmo-client` worker is built over.
///
/// Object-safe and `Send + Sync` so it can be stored as `Arc<dyn Transport>`
/// and shared between the worker task and, in tests, swapped for a mock.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// POST `body` to `url` and return the raw response, or a transport
    /// error (network, TLS, non-200, or anything else that makes this
    /// exchange a transport-level failure rather than a protocol one).
    async fn post(&self, url: &str, body: String) -> Result<TransportResponse, CosmoError>;
}
