//! cosmo-core — wire types, error taxonomy, the `Transport` trait, and the
//! `Promise` primitive shared by every piece of the Cosmopolite pub/sub
//! client.
//!
//! # Overview
//!
//! This crate holds the parts of the client that do not need a `tokio`
//! runtime to reason about:
//!
//! - [`promise`] — the single-assignment completion cell
//! - [`transport`] — the pluggable HTTP transport trait
//! - [`envelope`] — request/response envelope shapes and validation
//! - [`model`] — subjects, messages, subscriptions
//! - [`registry`] — the in-memory subscription table
//! - [`command`] — the outbound command queue
//! - [`error`] — the `CosmoError` taxonomy
//!
//! The session worker itself, which drives these pieces against a `tokio`
//! runtime, lives in `cosmo-client`.

pub mod command;
pub mod envelope;
pub mod error;
pub mod model;
pub mod promise;
pub mod registry;
pub mod transport;

pub use command::{CommandContext, CommandKind, CommandOutcome, CommandQueue, OutboundCommand, QueuedCommand};
pub use envelope::{RequestEnvelope, ResponseEnvelope, ResponseItem};
pub use error::CosmoError;
pub use model::{Message, RawEvent, Subject, Subscription, SubscriptionState};
pub use promise::{Outcome, Promise};
pub use registry::{InsertOutcome, SubscriptionRegistry};
pub use transport::{Transport, TransportResponse};
