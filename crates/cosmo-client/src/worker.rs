//! The session worker: the driver loop for a client's poll/retry cycle.
//!
//! One cycle = drain the command queue + poll + handle the response +
//! schedule the next cycle. Runs as a single `tokio` task per client,
//! dropping the client lock before every `.await` on the transport.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::sync::Notify;

use cosmo_core::command::{CommandContext, CommandKind, OutboundCommand, QueuedCommand};
use cosmo_core::{CommandOutcome, CosmoError, RequestEnvelope, ResponseEnvelope, ResponseItem, Subject, Subscription, Transport};

use crate::callbacks::Callbacks;
use crate::config::CosmoOptions;
use crate::dispatcher::{dispatch, DispatchEffect};
use crate::state::{fail_promise, ClientState, ConnectionState};

/// What a completed cycle tells the run loop: whether to keep going, and
/// how long to sleep before the next one.
struct CycleOutcome {
    next_delay_ms: u64,
}

pub(crate) struct Worker {
    pub(crate) client_id: String,
    pub(crate) instance_id: String,
    pub(crate) base_url: String,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) state: Arc<Mutex<ClientState>>,
    pub(crate) notify: Arc<Notify>,
    pub(crate) callbacks: Arc<Callbacks>,
    pub(crate) options: CosmoOptions,
    /// Whether `client_id` was freshly generated (vs. caller-supplied), so
    /// the run loop knows to fire `on_client_id_change` exactly once.
    pub(crate) client_id_generated: bool,
}

impl Worker {
    pub(crate) async fn run(self: Arc<Self>) {
        if self.client_id_generated {
            self.callbacks.fire_client_id_change(&self.client_id);
        }

        loop {
            {
                let mut state = self.state.lock().expect("lock poisoned");
                if state.shutdown {
                    state.queue.drain_failing(|p| fail_promise(p));
                    state.fail_profile_waiters();
                    break;
                }
            }

            let outcome = self.run_cycle().await;

            let deadline = tokio::time::Instant::now() + Duration::from_millis(outcome.next_delay_ms);
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }

    fn compute_base_delay(&self) -> u64 {
        let ceiling_ms = self.options.jitter_ceiling().as_millis() as u64;
        let jitter = if ceiling_ms == 0 {
            0
        } else {
            rand::Rng::gen_range(&mut rand::thread_rng(), 0..ceiling_ms)
        };
        self.options.cycle_base.as_millis() as u64 + jitter
    }

    async fn run_cycle(&self) -> CycleOutcome {
        // Step 1: detach the queue and ack buffer, compute this cycle's
        // base sleep target, release the lock before any I/O.
        let (user_cmds, ack, mut next_delay_ms) = {
            let mut state = self.state.lock().expect("lock poisoned");
            let user_cmds = state.queue.detach();
            let ack = std::mem::take(&mut state.ack_buffer);
            let delay = self.compute_base_delay();
            state.next_delay_ms = delay;
            (user_cmds, ack, delay)
        };

        // Step 2: build and submit the envelope.
        let mut commands = Vec::with_capacity(user_cmds.len() + 1);
        commands.push(OutboundCommand {
            command: CommandKind::Poll.wire_name(),
            arguments: json!({ "ack": ack }),
        });
        commands.extend(user_cmds.iter().map(|c| c.outbound.clone()));
        let expected_responses = commands.len();

        let envelope = RequestEnvelope {
            client_id: self.client_id.clone(),
            instance_id: self.instance_id.clone(),
            commands,
        };
        let body = serde_json::to_string(&envelope).expect("envelope is always serializable");

        tracing::debug!(
            instance_id = %self.instance_id,
            commands = expected_responses,
            "submitting cycle"
        );

        let transport_result = self.transport.post(&self.base_url, body).await;

        // Fold transport failure and envelope parse failure into one "this
        // cycle produced nothing usable" outcome — the whole cycle is a
        // transport failure, never partially applied.
        let parsed: Result<ResponseEnvelope, ()> = match transport_result {
            Ok(resp) => {
                if resp.retry_after_zero {
                    next_delay_ms = 0;
                }
                match ResponseEnvelope::parse(&resp.body, expected_responses) {
                    Ok(env) => Ok(env),
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed response envelope, requeueing cycle");
                        Err(())
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "transport failure, requeueing cycle");
                Err(())
            }
        };

        let mut effects: Vec<DispatchEffect> = Vec::new();
        let mut fired_connect = false;
        let mut fired_disconnect = false;

        let mut state = self.state.lock().expect("lock poisoned");

        let retry_set = match parsed {
            Err(()) => user_cmds,
            Ok(envelope) => {
                // Step 5: profile change.
                if envelope.profile != state.profile {
                    state.profile = envelope.profile.clone();
                    if !state.profile.is_null() {
                        state.resolve_profile_waiters();
                    }
                }

                // Step 6: record success, fire connect edge.
                state.last_success = Instant::now();
                if state.connection != ConnectionState::Connected {
                    state.connection = ConnectionState::Connected;
                    fired_connect = true;
                }

                // Step 7: dispatch events (acks appended inside `dispatch`).
                for event in envelope.events {
                    effects.push(dispatch(&mut state, event));
                }

                // Step 8: generation change -> resubscribe every Active subscription.
                let new_generation = envelope.generation().cloned();
                if new_generation != state.generation {
                    tracing::debug!(instance_id = %self.instance_id, "instance generation changed, resubscribing");
                    state.generation = new_generation;
                    let resubscribes: Vec<QueuedCommand> = state
                        .registry
                        .active()
                        .map(build_resubscribe_command)
                        .collect();
                    for cmd in resubscribes {
                        state.queue.push_back(cmd);
                    }
                }

                // Step 9: walk user commands against their positional responses.
                let response_items = &envelope.responses[1..];
                let mut retry_set = Vec::new();
                for (cmd, item) in user_cmds.into_iter().zip(response_items.iter()) {
                    handle_user_response(&mut state, cmd, item, &mut retry_set);
                }
                retry_set
            }
        };

        // Step 10: append retries to the tail, behind anything the API
        // queued while the RPC was in flight, check the disconnect edge,
        // stash the computed delay.
        state.queue.requeue_back(retry_set);

        let now = Instant::now();
        if now.saturating_duration_since(state.last_success) > self.options.connect_timeout
            && state.connection != ConnectionState::Disconnected
        {
            state.connection = ConnectionState::Disconnected;
            fired_disconnect = true;
        }
        state.next_delay_ms = next_delay_ms;
        drop(state);

        // Callbacks run outside the client lock.
        if fired_connect {
            self.callbacks.fire_connect();
        }
        if fired_disconnect {
            self.callbacks.fire_disconnect();
        }
        for effect in effects {
            match effect {
                DispatchEffect::Message(m) => self.callbacks.fire_message(&m),
                DispatchEffect::Login => self.callbacks.fire_login(),
                DispatchEffect::Logout => self.callbacks.fire_logout(),
                DispatchEffect::None => {}
            }
        }

        CycleOutcome { next_delay_ms }
    }
}

fn build_resubscribe_command(sub: &Subscription) -> QueuedCommand {
    let mut arguments = json!({ "subject": sub.subject });
    // Once the buffer holds a concrete last id, resume from exactly there
    // and omit `messages` — a replay count only matters for the initial
    // backfill, which already happened. `messages` is only meaningful
    // again if the buffer is empty and there is nothing to resume from.
    if sub.messages.is_empty() {
        if let Some(n) = sub.num_messages {
            arguments["messages"] = json!(n);
        }
    }
    if let Some(id) = sub.resubscribe_last_id() {
        arguments["last_id"] = json!(id);
    }
    QueuedCommand::new(
        CommandKind::Subscribe,
        arguments,
        CommandContext::Subscribe {
            subject: sub.subject.clone(),
        },
        None,
    )
}

fn handle_user_response(
    state: &mut ClientState,
    cmd: QueuedCommand,
    item: &ResponseItem,
    retry_set: &mut Vec<QueuedCommand>,
) {
    if item.result == "retry" {
        retry_set.push(cmd);
        return;
    }

    match cmd.context {
        CommandContext::Poll => unreachable!("poll is never a user-queued command"),
        CommandContext::Subscribe { ref subject } => {
            if item.result == "ok" {
                state.registry.mark_active(subject);
                if let Some(p) = cmd.promise {
                    p.succeed(CommandOutcome::Subscribed);
                }
            } else {
                state.registry.remove(subject);
                if let Some(p) = cmd.promise {
                    p.fail(CosmoError::ServerRejected(item.result.clone()));
                }
            }
        }
        CommandContext::Unsubscribe { .. } => {
            if let Some(p) = cmd.promise {
                if item.result == "ok" {
                    p.succeed(CommandOutcome::Unsubscribed);
                } else {
                    p.fail(CosmoError::ServerRejected(item.result.clone()));
                }
            }
        }
        CommandContext::SendMessage { ref subject } => {
            if item.result == "ok" || item.result == "duplicate_message" {
                let outcome = item
                    .message
                    .as_ref()
                    .ok_or_else(|| {
                        CosmoError::Protocol("sendMessage response missing echoed message".into())
                    })
                    .and_then(|raw| parse_echoed_message(raw, subject));
                if let Some(p) = cmd.promise {
                    match outcome {
                        Ok(message) => p.succeed(CommandOutcome::MessageSent(message)),
                        Err(e) => p.fail(e),
                    }
                }
            } else if let Some(p) = cmd.promise {
                p.fail(CosmoError::ServerRejected(item.result.clone()));
            }
        }
    }
}

fn parse_echoed_message(raw: &Value, fallback_subject: &Subject) -> Result<cosmo_core::Message, CosmoError> {
    let id = raw
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| CosmoError::Protocol("echoed message missing id".into()))?;
    let message_str = raw
        .get("message")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CosmoError::Protocol("echoed message missing message payload".into()))?;
    let decoded: Value = serde_json::from_str(message_str)
        .map_err(|e| CosmoError::Protocol(format!("undecodable echoed message: {e}")))?;
    let subject = raw
        .get("subject")
        .and_then(|v| serde_json::from_value::<Subject>(v.clone()).ok())
        .unwrap_or_else(|| fallback_subject.clone());
    let sender_message_id = raw
        .get("sender_message_id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let event_id = raw.get("event_id").cloned();

    Ok(cosmo_core::Message {
        subject,
        id,
        message: decoded,
        event_id,
        sender_message_id,
    })
}
