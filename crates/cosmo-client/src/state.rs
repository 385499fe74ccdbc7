//! `ClientState` — everything guarded by the client lock.
//!
//! Held for strictly bounded durations, never across an `.await`: the
//! worker drops its `MutexGuard` before constructing the transport future,
//! and the public API only ever touches this struct synchronously.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use cosmo_core::{CommandQueue, CommandOutcome, Promise, SubscriptionRegistry};

/// Connectivity edge state: tracks the connect/disconnect edges fired from
/// the worker's per-cycle success/timeout check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No successful cycle yet.
    InitialConnect,
    Connected,
    Disconnected,
}

/// Login/logout edge state, driven by `login`/`logout` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn,
}

/// Everything the worker and the public API share, behind one
/// `std::sync::Mutex`.
pub struct ClientState {
    pub queue: CommandQueue,
    pub registry: SubscriptionRegistry,
    /// Event ids pending acknowledgment on the next poll.
    pub ack_buffer: Vec<Value>,
    pub profile: Value,
    pub generation: Option<Value>,
    pub connection: ConnectionState,
    pub session: SessionState,
    /// Wall-clock time of the last successful cycle, used for the
    /// disconnect edge. Initialized to construction time so a client that
    /// never once succeeds still trips `connect_timeout` instead of
    /// comparing against `None` forever.
    pub last_success: Instant,
    /// Computed at the top of each cycle; `0` collapses the next sleep,
    /// whether because the server sent `Retry-After: 0` or a new command
    /// just arrived.
    pub next_delay_ms: u64,
    pub shutdown: bool,
    /// Waiters on `get_profile` not yet resolved because the profile is
    /// still null.
    pub profile_waiters: Vec<Arc<Promise<Value>>>,
}

impl ClientState {
    pub fn new() -> Self {
        Self {
            queue: CommandQueue::new(),
            registry: SubscriptionRegistry::new(),
            ack_buffer: Vec::new(),
            profile: Value::Null,
            generation: None,
            connection: ConnectionState::InitialConnect,
            session: SessionState::LoggedOut,
            last_success: Instant::now(),
            next_delay_ms: 0,
            shutdown: false,
            profile_waiters: Vec::new(),
        }
    }

    /// Resolve every pending `get_profile` waiter with the current profile,
    /// draining the waiter list. Called when the cached profile changes to
    /// a non-null value.
    pub fn resolve_profile_waiters(&mut self) {
        for waiter in self.profile_waiters.drain(..) {
            waiter.succeed(self.profile.clone());
        }
    }

    /// Fail every pending `get_profile` waiter on shutdown.
    pub fn fail_profile_waiters(&mut self) {
        for waiter in self.profile_waiters.drain(..) {
            waiter.fail(cosmo_core::CosmoError::Shutdown);
        }
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn fail_promise(promise: &Arc<Promise<CommandOutcome>>) {
    promise.fail(cosmo_core::CosmoError::Shutdown);
}
