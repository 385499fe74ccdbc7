//! Wire-level value types: subjects, messages, subscriptions, events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named channel, optionally scoped by a read and/or write ACL string.
///
/// Identity is structural: the registry compares subjects field-by-field,
/// exactly as the server does when it uses this tuple as the subscription
/// key (see [`crate::registry::SubscriptionRegistry`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readable_only_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writeable_only_by: Option<String>,
}

impl Subject {
    /// A subject with no read/write ACL restriction.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            readable_only_by: None,
            writeable_only_by: None,
        }
    }
}

/// A message as delivered by the server, with the wire-level JSON-encoded
/// `message` field already decoded into a [`Value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub subject: Subject,
    pub id: i64,
    pub message: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_message_id: Option<String>,
}

/// A raw event off the wire, before the dispatcher has classified it.
///
/// Mirrors the `events[]` entries in the response envelope: most fields are
/// only meaningful for a subset of `event_type`s, so they are all optional
/// here and validated at dispatch time.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub event_type: String,
    #[serde(default)]
    pub event_id: Option<Value>,
    #[serde(default)]
    pub subject: Option<Subject>,
    #[serde(default)]
    pub id: Option<i64>,
    /// JSON-encoded string for `message` events; decoded by the dispatcher.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sender_message_id: Option<String>,
}

/// Lifecycle state of a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// The `subscribe` command has been queued or sent, not yet acked.
    Pending,
    /// The server has confirmed this subscription is active.
    Active,
}

/// An in-memory subscription: its lifecycle state, the ordered, deduplicated
/// message buffer, and the replay parameters to use on resubscribe.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub subject: Subject,
    pub state: SubscriptionState,
    /// Ascending by `id`, no duplicates — see [`crate::registry::SubscriptionRegistry::insert_message`].
    pub messages: Vec<Message>,
    pub num_messages: Option<i64>,
    pub last_id: Option<i64>,
}

impl Subscription {
    pub fn pending(subject: Subject, num_messages: Option<i64>, last_id: Option<i64>) -> Self {
        Self {
            subject,
            state: SubscriptionState::Pending,
            messages: Vec::new(),
            num_messages,
            last_id,
        }
    }

    /// The `last_id` to use on resubscribe: the greatest buffered id takes
    /// priority over the caller-supplied `last_id`.
    pub fn resubscribe_last_id(&self) -> Option<i64> {
        self.messages.last().map(|m| m.id).or(self.last_id)
    }
}
