//! The public client API: a thin facade translating user calls into queued
//! commands and registry edits, backed by the session worker.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use cosmo_core::command::{CommandContext, CommandKind, QueuedCommand};
use cosmo_core::{CommandOutcome, CosmoError, Message, Promise, Subject};
use cosmo_http::{HttpTransport, HttpTransportConfig};

use crate::callbacks::Callbacks;
use crate::config::CosmoOptions;
use crate::state::ClientState;
use crate::worker::Worker;

/// Per-subject outcome of a (possibly fanned-out) [`Client::subscribe`] call.
#[derive(Debug, Clone)]
pub struct SubscribeOutcome {
    pub subject: Subject,
    pub result: Result<(), CosmoError>,
}

/// A running Cosmopolite client: one background worker task plus a handle
/// callers use to subscribe, publish, and observe state.
pub struct Client {
    client_id: String,
    instance_id: String,
    state: Arc<Mutex<ClientState>>,
    notify: Arc<Notify>,
    worker_handle: Option<JoinHandle<()>>,
}

impl Client {
    /// Start a client against `base_url`. If `client_id` is `None`, one is
    /// generated and `callbacks.on_client_id_change` fires exactly once
    /// from the worker task before its first cycle.
    pub async fn create(
        base_url: impl Into<String>,
        client_id: Option<String>,
        callbacks: Arc<Callbacks>,
        options: CosmoOptions,
    ) -> Self {
        Self::create_with_transport(
            base_url,
            client_id,
            callbacks,
            options.clone(),
            Arc::new(HttpTransport::new(HttpTransportConfig {
                request_timeout: options.request_timeout,
            })),
        )
        .await
    }

    /// As [`Client::create`], but with an explicit [`cosmo_core::Transport`]
    /// — the seam test code uses to substitute a mock.
    pub async fn create_with_transport(
        base_url: impl Into<String>,
        client_id: Option<String>,
        callbacks: Arc<Callbacks>,
        options: CosmoOptions,
        transport: Arc<dyn cosmo_core::Transport>,
    ) -> Self {
        let client_id_generated = client_id.is_none();
        let client_id = client_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let instance_id = uuid::Uuid::new_v4().to_string();

        if crate::debug_tracing_requested() {
            tracing::debug!(client_id = %client_id, instance_id = %instance_id, "cosmo client starting");
        }

        let state = Arc::new(Mutex::new(ClientState::new()));
        let notify = Arc::new(Notify::new());

        let worker = Arc::new(Worker {
            client_id: client_id.clone(),
            instance_id: instance_id.clone(),
            base_url: base_url.into(),
            transport,
            state: state.clone(),
            notify: notify.clone(),
            callbacks,
            options,
            client_id_generated,
        });

        let worker_handle = tokio::spawn(async move { worker.run().await });

        Self {
            client_id,
            instance_id,
            state,
            notify,
            worker_handle: Some(worker_handle),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Signal shutdown, wake the worker, and wait for it to drain the
    /// queue and exit.
    pub async fn shutdown(mut self) {
        {
            let mut state = self.state.lock().expect("lock poisoned");
            state.shutdown = true;
        }
        self.notify.notify_one();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.await;
        }
    }

    /// Subscribe to one or more subjects, sharing a single promise across
    /// the fanned-out `subscribe` commands. The promise resolves only once
    /// every subject has completed (succeeded or failed) — see DESIGN.md
    /// for why this crate resolves the open question this way.
    pub fn subscribe(
        &self,
        subjects: Vec<Subject>,
        num_messages: Option<i64>,
        last_id: Option<i64>,
    ) -> Arc<Promise<Vec<SubscribeOutcome>>> {
        let outer = Promise::<Vec<SubscribeOutcome>>::new();
        if subjects.is_empty() {
            outer.succeed(Vec::new());
            return outer;
        }

        let join = Arc::new(Mutex::new(JoinState {
            remaining: subjects.len(),
            results: Vec::with_capacity(subjects.len()),
        }));

        let mut state = self.state.lock().expect("lock poisoned");
        for subject in subjects {
            state.registry.upsert(subject.clone(), num_messages, last_id);

            let mut arguments = json!({ "subject": subject });
            if let Some(n) = num_messages {
                arguments["messages"] = json!(n);
            }
            if let Some(id) = last_id {
                arguments["last_id"] = json!(id);
            }

            let inner = make_join_promise(subject.clone(), join.clone(), outer.clone());
            let cmd = QueuedCommand::new(
                CommandKind::Subscribe,
                arguments,
                CommandContext::Subscribe { subject },
                Some(inner),
            );
            state.queue.push_back(cmd);
        }
        drop(state);
        self.notify.notify_one();
        outer
    }

    /// Convenience for a single-subject subscribe.
    pub fn subscribe_one(
        &self,
        subject: Subject,
        num_messages: Option<i64>,
        last_id: Option<i64>,
    ) -> Arc<Promise<Vec<SubscribeOutcome>>> {
        self.subscribe(vec![subject], num_messages, last_id)
    }

    /// Remove `subject` from the registry immediately, then enqueue the
    /// `unsubscribe` command (a late subscribe response can
    /// never resurrect a subscription removed this way).
    pub fn unsubscribe(&self, subject: Subject) -> Arc<Promise<CommandOutcome>> {
        let promise = Promise::new();
        let mut state = self.state.lock().expect("lock poisoned");
        state.registry.remove(&subject);
        let cmd = QueuedCommand::new(
            CommandKind::Unsubscribe,
            json!({ "subject": subject.clone() }),
            CommandContext::Unsubscribe { subject },
            Some(promise.clone()),
        );
        state.queue.push_back(cmd);
        drop(state);
        self.notify.notify_one();
        promise
    }

    /// Publish `message` to `subject`.
    pub fn send_message(&self, subject: Subject, message: Value) -> Arc<Promise<CommandOutcome>> {
        let promise = Promise::new();
        let sender_message_id = uuid::Uuid::new_v4().to_string();
        let encoded = serde_json::to_string(&message).expect("JSON value always encodes");

        let arguments = json!({
            "subject": subject,
            "message": encoded,
            "sender_message_id": sender_message_id,
        });

        let mut state = self.state.lock().expect("lock poisoned");
        let cmd = QueuedCommand::new(
            CommandKind::SendMessage,
            arguments,
            CommandContext::SendMessage { subject },
            Some(promise.clone()),
        );
        state.queue.push_back(cmd);
        drop(state);
        self.notify.notify_one();
        promise
    }

    /// A deep-copied snapshot of `subject`'s buffered messages, or `None` if
    /// there is no such subscription.
    pub fn get_messages(&self, subject: &Subject) -> Option<Vec<Message>> {
        let state = self.state.lock().expect("lock poisoned");
        state.registry.find(subject).map(|s| s.messages.clone())
    }

    pub fn get_last_message(&self, subject: &Subject) -> Option<Message> {
        let state = self.state.lock().expect("lock poisoned");
        state.registry.find(subject).and_then(|s| s.messages.last().cloned())
    }

    /// Resolve immediately if the cached profile is already non-null;
    /// otherwise append a waiter the worker resolves on the first
    /// non-null profile.
    pub fn get_profile(&self) -> Arc<Promise<Value>> {
        let promise = Promise::new();
        let mut state = self.state.lock().expect("lock poisoned");
        if state.profile.is_null() {
            state.profile_waiters.push(promise.clone());
        } else {
            promise.succeed(state.profile.clone());
        }
        promise
    }

    pub fn current_profile(&self) -> Value {
        self.state.lock().expect("lock poisoned").profile.clone()
    }
}

struct JoinState {
    remaining: usize,
    results: Vec<SubscribeOutcome>,
}

fn make_join_promise(
    subject: Subject,
    join: Arc<Mutex<JoinState>>,
    outer: Arc<Promise<Vec<SubscribeOutcome>>>,
) -> Arc<Promise<CommandOutcome>> {
    let join_ok = join.clone();
    let outer_ok = outer.clone();
    let subject_ok = subject.clone();

    let join_err = join.clone();
    let outer_err = outer.clone();
    let subject_err = subject;

    Promise::with_callbacks(
        Some(Box::new(move |_outcome: &CommandOutcome| {
            record_join(
                &join_ok,
                &outer_ok,
                SubscribeOutcome {
                    subject: subject_ok.clone(),
                    result: Ok(()),
                },
            );
        })),
        Some(Box::new(move |err: &CosmoError| {
            record_join(
                &join_err,
                &outer_err,
                SubscribeOutcome {
                    subject: subject_err.clone(),
                    result: Err(err.clone()),
                },
            );
        })),
    )
}

fn record_join(
    join: &Arc<Mutex<JoinState>>,
    outer: &Arc<Promise<Vec<SubscribeOutcome>>>,
    item: SubscribeOutcome,
) {
    let mut guard = join.lock().expect("lock poisoned");
    guard.results.push(item);
    guard.remaining -= 1;
    if guard.remaining == 0 {
        outer.succeed(std::mem::take(&mut guard.results));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmo_core::Outcome;

    /// A `Client` with no worker task, for exercising the queue/registry
    /// side of the public API in isolation from the cycle loop.
    fn client_without_worker() -> Client {
        Client {
            client_id: "test-client".to_string(),
            instance_id: "test-instance".to_string(),
            state: Arc::new(Mutex::new(ClientState::new())),
            notify: Arc::new(Notify::new()),
            worker_handle: None,
        }
    }

    #[test]
    fn subscribe_with_no_subjects_resolves_immediately_with_empty_vec() {
        let client = client_without_worker();
        let promise = client.subscribe(Vec::new(), None, None);
        match promise.wait() {
            Outcome::Success(v) => assert!(v.is_empty()),
            Outcome::Failure(_) => panic!("expected success"),
        }
    }

    #[test]
    fn subscribe_upserts_pending_subscription_and_queues_command() {
        let client = client_without_worker();
        let subject = Subject::new("/test/a");
        let _promise = client.subscribe_one(subject.clone(), Some(5), None);

        let state = client.state.lock().unwrap();
        assert!(state.registry.find(&subject).is_some());
        assert_eq!(state.queue.len(), 1);
    }

    #[test]
    fn unsubscribe_removes_from_registry_before_ack() {
        let client = client_without_worker();
        let subject = Subject::new("/test/a");
        client.subscribe_one(subject.clone(), None, None);
        assert!(client.state.lock().unwrap().registry.find(&subject).is_some());

        let _promise = client.unsubscribe(subject.clone());
        assert!(client.state.lock().unwrap().registry.find(&subject).is_none());
    }

    #[test]
    fn get_profile_resolves_immediately_when_already_cached() {
        let client = client_without_worker();
        client.state.lock().unwrap().profile = json!("alice");
        match client.get_profile().wait() {
            Outcome::Success(v) => assert_eq!(v, json!("alice")),
            Outcome::Failure(_) => panic!("expected success"),
        }
    }

    #[test]
    fn get_profile_queues_waiter_when_profile_is_null() {
        let client = client_without_worker();
        let promise = client.get_profile();
        assert!(!promise.is_fulfilled());
        assert_eq!(client.state.lock().unwrap().profile_waiters.len(), 1);
    }

    #[test]
    fn get_messages_returns_none_for_unknown_subject() {
        let client = client_without_worker();
        assert!(client.get_messages(&Subject::new("/test/nope")).is_none());
    }
}
