//! A fake Cosmopolite server, driven entirely in-process, standing in for
//! the real HTTPS endpoint so the worker's cycle logic can be exercised
//! without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use cosmo_core::{CosmoError, Transport, TransportResponse};

struct SubjectState {
    messages: Vec<(i64, Value)>,
    next_id: i64,
    subscribed: bool,
}

impl Default for SubjectState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            next_id: 1,
            subscribed: false,
        }
    }
}

pub struct FakeServer {
    generation: String,
    profile: Value,
    subjects: HashMap<String, SubjectState>,
    pending_events: VecDeque<Value>,
    event_counter: u64,
}

impl FakeServer {
    fn new() -> Self {
        Self {
            generation: "gen-0".to_string(),
            profile: Value::Null,
            subjects: HashMap::new(),
            pending_events: VecDeque::new(),
            event_counter: 0,
        }
    }

    pub fn log_in(&mut self, profile: Value) {
        self.profile = profile;
        self.pending_events.push_back(json!({ "event_type": "login" }));
    }

    /// Simulate the server forgetting all per-instance state: bump the
    /// generation token and mark every subject as no longer subscribed, so
    /// a client that fails to resubscribe stops receiving new messages.
    pub fn lose_instance_state(&mut self) {
        self.event_counter += 1;
        self.generation = format!("gen-{}", self.event_counter);
        for subject in self.subjects.values_mut() {
            subject.subscribed = false;
        }
    }

    fn next_event_id(&mut self) -> Value {
        self.event_counter += 1;
        json!(format!("evt-{}", self.event_counter))
    }

    fn handle(&mut self, body: &str) -> (u16, String) {
        let req: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(_) => return (400, "{}".to_string()),
        };
        let commands = req["commands"].as_array().cloned().unwrap_or_default();

        let mut responses = Vec::with_capacity(commands.len());
        for (idx, cmd) in commands.iter().enumerate() {
            let name = cmd["command"].as_str().unwrap_or_default();
            let arguments = &cmd["arguments"];
            let response = if idx == 0 {
                json!({ "result": "ok", "instance_generation": self.generation })
            } else {
                match name {
                    "subscribe" => self.handle_subscribe(arguments),
                    "unsubscribe" => self.handle_unsubscribe(arguments),
                    "sendMessage" => self.handle_send_message(arguments),
                    _ => json!({ "result": "unknown_command" }),
                }
            };
            responses.push(response);
        }

        let events: Vec<Value> = self.pending_events.drain(..).collect();
        let body = json!({
            "profile": self.profile,
            "responses": responses,
            "events": events,
        });
        (200, body.to_string())
    }

    fn handle_subscribe(&mut self, arguments: &Value) -> Value {
        let name = arguments["subject"]["name"].as_str().unwrap_or_default().to_string();
        let messages = arguments["messages"].as_i64();
        let last_id = arguments["last_id"].as_i64();
        let subject_json = arguments["subject"].clone();

        let subject = self.subjects.entry(name.clone()).or_default();
        subject.subscribed = true;

        let mut replay: Vec<(i64, Value)> = subject
            .messages
            .iter()
            .filter(|(id, _)| last_id.map_or(true, |l| *id > l))
            .cloned()
            .collect();
        if let Some(n) = messages {
            let n = n.max(0) as usize;
            if replay.len() > n {
                replay = replay.split_off(replay.len() - n);
            }
        } else {
            replay.clear();
        }

        for (id, message) in replay {
            let event_id = self.next_event_id();
            self.pending_events.push_back(json!({
                "event_type": "message",
                "event_id": event_id,
                "subject": subject_json,
                "id": id,
                "message": serde_json::to_string(&message).unwrap(),
            }));
        }

        json!({ "result": "ok" })
    }

    fn handle_unsubscribe(&mut self, arguments: &Value) -> Value {
        let name = arguments["subject"]["name"].as_str().unwrap_or_default();
        if let Some(subject) = self.subjects.get_mut(name) {
            subject.subscribed = false;
        }
        json!({ "result": "ok" })
    }

    fn handle_send_message(&mut self, arguments: &Value) -> Value {
        let name = arguments["subject"]["name"].as_str().unwrap_or_default().to_string();
        let subject_json = arguments["subject"].clone();
        let sender_message_id = arguments["sender_message_id"].clone();
        let encoded = arguments["message"].as_str().unwrap_or_default();
        let decoded: Value = serde_json::from_str(encoded).unwrap_or(Value::Null);

        let subject = self.subjects.entry(name).or_default();
        let id = subject.next_id;
        subject.next_id += 1;
        subject.messages.push((id, decoded.clone()));
        let subscribed = subject.subscribed;

        if subscribed {
            let event_id = self.next_event_id();
            self.pending_events.push_back(json!({
                "event_type": "message",
                "event_id": event_id,
                "subject": subject_json.clone(),
                "id": id,
                "message": encoded,
            }));
        }

        json!({
            "result": "ok",
            "message": {
                "subject": subject_json,
                "id": id,
                "message": encoded,
                "sender_message_id": sender_message_id,
            }
        })
    }
}

/// `Transport` wrapper over a shared [`FakeServer`], with a kill switch to
/// simulate transport-level failure for the reconnect scenario.
#[derive(Clone)]
pub struct MockTransport {
    server: Arc<Mutex<FakeServer>>,
    failing: Arc<AtomicBool>,
    call_count: Arc<AtomicU64>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            server: Arc::new(Mutex::new(FakeServer::new())),
            failing: Arc::new(AtomicBool::new(false)),
            call_count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn server(&self) -> Arc<Mutex<FakeServer>> {
        self.server.clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(&self, _url: &str, body: String) -> Result<TransportResponse, CosmoError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CosmoError::Transport("forced failure".to_string()));
        }
        let (status, body) = self.server.lock().expect("lock poisoned").handle(&body);
        Ok(TransportResponse {
            status,
            body,
            retry_after_zero: false,
        })
    }
}

/// Poll `f` until it returns `Some`, or panic after `timeout`.
pub async fn wait_for<T>(timeout: std::time::Duration, mut f: impl FnMut() -> Option<T>) -> T {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(v) = f() {
            return v;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for condition");
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}
