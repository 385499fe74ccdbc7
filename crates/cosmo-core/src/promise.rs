//! A single-assignment completion cell with optional success/failure callbacks.
//!
//! A cell constructed with two optional callbacks, completed exactly once
//! from any thread, and observable either by blocking (`wait`) or by
//! `await`ing (`recv`). There is no explicit `cleanup` callback — `Drop` on
//! `T` does that job — and the cell is generic over its payload.
//!
//! `complete`/`succeed`/`fail` may be called from the worker task; `wait` is
//! meant for callers on a plain thread, `recv` for callers inside another
//! `tokio` task. Both can be used on the same promise, though in practice a
//! given call site picks one.

use std::sync::{Arc, Condvar, Mutex};

use tokio::sync::Notify;

use crate::error::CosmoError;

/// The terminal state of a [`Promise`]: either the success payload, or the
/// error that explains why the command did not succeed.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Success(T),
    Failure(CosmoError),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

type SuccessCallback<T> = Box<dyn FnOnce(&T) + Send>;
type FailureCallback = Box<dyn FnOnce(&CosmoError) + Send>;

struct State<T> {
    outcome: Option<Outcome<T>>,
    on_success: Option<SuccessCallback<T>>,
    on_failure: Option<FailureCallback>,
}

/// A single-assignment completion cell.
///
/// Always held behind an `Arc` — callers retain a handle to `wait`/`recv` on
/// it while the worker retains a handle to complete it, and the two sides
/// race only once (the first `complete` wins; later calls are a programmer
/// error, checked with a `debug_assert`).
pub struct Promise<T> {
    state: Mutex<State<T>>,
    condvar: Condvar,
    notify: Notify,
}

impl<T> Promise<T> {
    /// Create a promise with no callbacks.
    pub fn new() -> Arc<Self> {
        Self::with_callbacks(None, None)
    }

    /// Create a promise with optional success/failure callbacks. Callbacks
    /// run synchronously, under the promise's internal lock, from whatever
    /// thread calls `complete` — they must not re-enter this promise.
    pub fn with_callbacks(
        on_success: Option<SuccessCallback<T>>,
        on_failure: Option<FailureCallback>,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                outcome: None,
                on_success,
                on_failure,
            }),
            condvar: Condvar::new(),
            notify: Notify::new(),
        })
    }

    /// Returns `true` once `complete` (or `succeed`/`fail`) has run.
    pub fn is_fulfilled(&self) -> bool {
        self.state.lock().expect("lock poisoned").outcome.is_some()
    }

    /// Complete the promise with a successful result.
    pub fn succeed(self: &Arc<Self>, value: T) {
        self.complete(Outcome::Success(value));
    }

    /// Complete the promise with a failure.
    pub fn fail(self: &Arc<Self>, err: CosmoError) {
        self.complete(Outcome::Failure(err));
    }

    /// Complete the promise. Exactly-once: completing an already-fulfilled
    /// promise is an invariant violation of this library's own bookkeeping,
    /// not a user-facing error, so it is only checked in debug builds.
    pub fn complete(self: &Arc<Self>, outcome: Outcome<T>) {
        let mut state = self.state.lock().expect("lock poisoned");
        debug_assert!(state.outcome.is_none(), "promise completed twice");

        match &outcome {
            Outcome::Success(value) => {
                if let Some(cb) = state.on_success.take() {
                    cb(value);
                }
            }
            Outcome::Failure(err) => {
                if let Some(cb) = state.on_failure.take() {
                    cb(err);
                }
            }
        }

        state.outcome = Some(outcome);
        drop(state);

        self.condvar.notify_all();
        self.notify.notify_waiters();
    }
}

impl<T: Clone> Promise<T> {
    /// Block the calling thread until the promise is fulfilled.
    pub fn wait(&self) -> Outcome<T> {
        let mut state = self.state.lock().expect("lock poisoned");
        while state.outcome.is_none() {
            state = self.condvar.wait(state).expect("lock poisoned");
        }
        state.outcome.clone().expect("checked above")
    }

    /// `await` until the promise is fulfilled. Safe against the
    /// complete-before-poll race: the `Notified` future is created and
    /// enabled before the state is checked, so a `complete()` that runs
    /// between the check and the `.await` is not missed.
    pub async fn recv(&self) -> Outcome<T> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.state.lock().expect("lock poisoned").outcome.clone() {
                return outcome;
            }

            notified.await;
        }
    }
}
