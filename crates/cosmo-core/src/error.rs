//! Error taxonomy for the Cosmopolite client.
//!
//! Every variant is owned (no borrowed or non-`Clone` source errors) so that
//! a single [`CosmoError`] can be cloned into a promise's failure slot and,
//! independently, logged by the worker — see `Promise<T>` in `promise.rs`.

use thiserror::Error;

/// Errors surfaced to callers of the public API, or stored as the failure
/// payload of a [`crate::promise::Promise`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CosmoError {
    /// The pluggable transport failed (network, TLS, non-200, etc.).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response envelope didn't match the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server returned a result other than `"ok"`/`"retry"`/`"duplicate_message"`.
    #[error("server rejected command: {0}")]
    ServerRejected(String),

    /// The client was shut down before this command could complete.
    #[error("client shut down before command completed")]
    Shutdown,
}

impl CosmoError {
    /// Returns `true` if the underlying condition is expected to clear up on
    /// its own (network blip, server backpressure) as opposed to being a
    /// final verdict from the server.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Protocol(_))
    }
}
