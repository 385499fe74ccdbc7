//! The subscription registry: an in-memory map of active subscriptions,
//! keyed by structural subject equality.
//!
//! Production scale is dozens of subjects per client, not thousands, so a
//! linear scan over a `Vec` is accepted rather than canonicalizing subjects
//! to a content hash for `HashMap` lookup (see DESIGN.md).

use crate::model::{Message, Subject, Subscription, SubscriptionState};

/// In-memory table of this client's subscriptions.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscriptions: Vec<Subscription>,
}

/// Outcome of [`SubscriptionRegistry::insert_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
    UnknownSubject,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, subject: &Subject) -> Option<&Subscription> {
        self.subscriptions.iter().find(|s| &s.subject == subject)
    }

    pub fn find_mut(&mut self, subject: &Subject) -> Option<&mut Subscription> {
        self.subscriptions.iter_mut().find(|s| &s.subject == subject)
    }

    /// Insert a new `Pending` subscription if absent; otherwise update the
    /// replay parameters in place, preserving the existing message buffer.
    pub fn upsert(
        &mut self,
        subject: Subject,
        num_messages: Option<i64>,
        last_id: Option<i64>,
    ) -> &mut Subscription {
        if let Some(idx) = self.subscriptions.iter().position(|s| s.subject == subject) {
            let sub = &mut self.subscriptions[idx];
            sub.num_messages = num_messages;
            sub.last_id = last_id;
            &mut self.subscriptions[idx]
        } else {
            self.subscriptions
                .push(Subscription::pending(subject, num_messages, last_id));
            self.subscriptions.last_mut().expect("just pushed")
        }
    }

    /// Remove the first matching subscription, if any.
    pub fn remove(&mut self, subject: &Subject) -> Option<Subscription> {
        let idx = self.subscriptions.iter().position(|s| &s.subject == subject)?;
        Some(self.subscriptions.remove(idx))
    }

    pub fn mark_active(&mut self, subject: &Subject) {
        if let Some(sub) = self.find_mut(subject) {
            sub.state = SubscriptionState::Active;
        }
    }

    /// Every subscription currently `Active`, for resubscribe-on-generation-change.
    pub fn active(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions
            .iter()
            .filter(|s| s.state == SubscriptionState::Active)
    }

    /// Insert `message` into its subject's buffer, maintaining the strict
    /// ascending-by-id, no-duplicates invariant.
    ///
    /// Incoming messages are almost always in order, so this scans from the
    /// tail: the common case (new highest id) is O(1), and the rare
    /// out-of-order or duplicate case is O(back-scan distance).
    pub fn insert_message(&mut self, subject: &Subject, message: Message) -> InsertOutcome {
        let Some(sub) = self.find_mut(subject) else {
            return InsertOutcome::UnknownSubject;
        };

        let mut insert_at = sub.messages.len();
        for (i, existing) in sub.messages.iter().enumerate().rev() {
            if existing.id == message.id {
                return InsertOutcome::Duplicate;
            }
            if existing.id < message.id {
                break;
            }
            insert_at = i;
        }
        sub.messages.insert(insert_at, message);
        InsertOutcome::Inserted
    }
}
