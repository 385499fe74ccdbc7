//! The callback surface, invoked from the worker task.
//!
//! Each slot is a plain closure rather than a function pointer plus a
//! `void *` passthrough: a closure captures whatever state it needs, typed,
//! with no unsafe cast on the way back out.

use std::sync::Arc;

use cosmo_core::model::Message;

type ClientIdChangeFn = Box<dyn Fn(&str) + Send + Sync>;
type EdgeFn = Box<dyn Fn() + Send + Sync>;
type MessageFn = Box<dyn Fn(&Message) + Send + Sync>;

/// Caller-supplied, independently-nullable callback slots.
///
/// Every slot is optional; a client with no callbacks registered at all is
/// legitimate (it can still be driven purely through promises).
#[derive(Default)]
pub struct Callbacks {
    pub on_client_id_change: Option<ClientIdChangeFn>,
    pub on_connect: Option<EdgeFn>,
    pub on_disconnect: Option<EdgeFn>,
    pub on_login: Option<EdgeFn>,
    pub on_logout: Option<EdgeFn>,
    pub on_message: Option<MessageFn>,
}

impl Callbacks {
    pub fn builder() -> CallbacksBuilder {
        CallbacksBuilder::default()
    }

    pub(crate) fn fire_client_id_change(&self, new_id: &str) {
        if let Some(cb) = &self.on_client_id_change {
            run_guarded("client_id_change", || cb(new_id));
        }
    }

    pub(crate) fn fire_connect(&self) {
        if let Some(cb) = &self.on_connect {
            run_guarded("connect", || cb());
        }
    }

    pub(crate) fn fire_disconnect(&self) {
        if let Some(cb) = &self.on_disconnect {
            run_guarded("disconnect", || cb());
        }
    }

    pub(crate) fn fire_login(&self) {
        if let Some(cb) = &self.on_login {
            run_guarded("login", || cb());
        }
    }

    pub(crate) fn fire_logout(&self) {
        if let Some(cb) = &self.on_logout {
            run_guarded("logout", || cb());
        }
    }

    pub(crate) fn fire_message(&self, message: &Message) {
        if let Some(cb) = &self.on_message {
            run_guarded("message", || cb(message));
        }
    }
}

/// Run a user callback behind `catch_unwind`: a panicking callback must not
/// take the pending ack, or the worker task, down with it. `Box<dyn Fn>`
/// trait objects aren't provably `UnwindSafe` (auto traits don't propagate
/// through `dyn`), so the call is wrapped in `AssertUnwindSafe`: this crate
/// never mutates shared state from inside a callback closure, only reads
/// captured, already-owned data.
fn run_guarded(name: &'static str, f: impl FnOnce()) {
    if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(callback = name, panic = %msg, "user callback panicked");
    }
}

/// Builder for [`Callbacks`].
#[derive(Default)]
pub struct CallbacksBuilder {
    callbacks: Callbacks,
}

impl CallbacksBuilder {
    pub fn on_client_id_change(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.callbacks.on_client_id_change = Some(Box::new(f));
        self
    }

    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_connect = Some(Box::new(f));
        self
    }

    pub fn on_disconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_disconnect = Some(Box::new(f));
        self
    }

    pub fn on_login(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_login = Some(Box::new(f));
        self
    }

    pub fn on_logout(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_logout = Some(Box::new(f));
        self
    }

    pub fn on_message(mut self, f: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.callbacks.on_message = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Arc<Callbacks> {
        Arc::new(self.callbacks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn panicking_callback_is_caught_and_logged_not_propagated() {
        let callbacks = Callbacks::builder()
            .on_connect(|| panic!("boom"))
            .build();
        callbacks.fire_connect(); // must not unwind out of this test
    }

    #[test]
    fn unset_callback_is_a_silent_no_op() {
        let callbacks = Callbacks::builder().build();
        callbacks.fire_connect();
        callbacks.fire_disconnect();
    }

    #[test]
    fn registered_callback_runs() {
        let called = Arc::new(AtomicBool::new(false));
        let c2 = called.clone();
        let callbacks = Callbacks::builder()
            .on_login(move || c2.store(true, Ordering::SeqCst))
            .build();
        callbacks.fire_login();
        assert!(called.load(Ordering::SeqCst));
    }
}
