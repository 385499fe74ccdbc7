//! cosmo-client — the session worker and the public facade for the
//! Cosmopolite pub/sub client.
//!
//! # Overview
//!
//! An application constructs a [`Client`] with [`Client::create`], gets
//! back a handle backed by one background `tokio` task (the worker), and
//! drives it through:
//!
//! - [`Client::subscribe`] / [`Client::unsubscribe`] — subject subscriptions
//! - [`Client::send_message`] — publish
//! - [`Client::get_messages`] / [`Client::get_last_message`] — read the
//!   per-subject buffer
//! - [`Client::get_profile`] / [`Client::current_profile`] — session identity
//! - [`callbacks::Callbacks`] — connect/disconnect/login/logout/message edges
//!
//! The wire types, error taxonomy, promise primitive, and `Transport` trait
//! this crate builds on live in `cosmo-core`; the shipped HTTPS transport is
//! `cosmo-http`.
//!
//! Set `COSMO_DEBUG` to any non-empty value to get a one-line startup trace
//! naming the client/instance id; the crate's own `tracing` events are
//! always emitted and it is up to the embedding application to install a
//! subscriber that shows them.

pub mod callbacks;
pub mod client;
pub mod config;
mod dispatcher;
mod state;
mod worker;

pub use callbacks::Callbacks;
pub use client::{Client, SubscribeOutcome};
pub use config::{CosmoOptions, CosmoOptionsBuilder};
pub use state::{ConnectionState, SessionState};

pub use cosmo_core::{CommandOutcome, CosmoError, Message, Outcome, Promise, Subject};

/// Returns `true` if `COSMO_DEBUG` is set to any non-empty value.
pub fn debug_tracing_requested() -> bool {
    std::env::var("COSMO_DEBUG").map(|v| !v.is_empty()).unwrap_or(false)
}
