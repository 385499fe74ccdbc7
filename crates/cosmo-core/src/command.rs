//! The command queue and the outbound command representation.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::model::{Message, Subject};
use crate::promise::Promise;

/// The name as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Poll,
    Subscribe,
    Unsubscribe,
    SendMessage,
}

impl CommandKind {
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Poll => "poll",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::SendMessage => "sendMessage",
        }
    }
}

/// One entry of the request envelope's `commands` array.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundCommand {
    pub command: &'static str,
    pub arguments: Value,
}

/// What the worker resolves a command's promise with on success.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Subscribed,
    Unsubscribed,
    MessageSent(Message),
}

/// Enough context, beyond the wire bytes, for the worker to interpret the
/// positional response and route it back to the right piece of state.
#[derive(Debug, Clone)]
pub enum CommandContext {
    Poll,
    Subscribe { subject: Subject },
    Unsubscribe { subject: Subject },
    SendMessage { subject: Subject },
}

/// One node of the command queue: the wire body, routing context, and the
/// promise (if any) a caller is waiting on.
pub struct QueuedCommand {
    pub kind: CommandKind,
    pub outbound: OutboundCommand,
    pub context: CommandContext,
    pub promise: Option<Arc<Promise<CommandOutcome>>>,
}

impl QueuedCommand {
    pub fn new(
        kind: CommandKind,
        arguments: Value,
        context: CommandContext,
        promise: Option<Arc<Promise<CommandOutcome>>>,
    ) -> Self {
        Self {
            kind,
            outbound: OutboundCommand {
                command: kind.wire_name(),
                arguments,
            },
            context,
            promise,
        }
    }
}

/// The outbound command queue.
///
/// A `VecDeque` of owned nodes (see DESIGN.md for the tradeoff against an
/// intrusive linked list): FIFO ordering and per-node promise ownership are
/// what matters here, both of which `VecDeque` gives for free.
#[derive(Default)]
pub struct CommandQueue {
    queue: VecDeque<QueuedCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a newly submitted command to the tail.
    pub fn push_back(&mut self, cmd: QueuedCommand) {
        self.queue.push_back(cmd);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Detach the entire queue, installing an empty one in its place. Used
    /// by the worker at the start of each cycle to establish the
    /// serialization point between in-flight and newly submitted commands.
    pub fn detach(&mut self) -> Vec<QueuedCommand> {
        std::mem::take(&mut self.queue).into_iter().collect()
    }

    /// Append a retry set to the tail, behind anything the API already
    /// appended while the cycle's RPC was in flight: new submissions are
    /// not starved behind a backlog of failures.
    pub fn requeue_back(&mut self, retry_set: Vec<QueuedCommand>) {
        self.queue.extend(retry_set);
    }

    /// Drain every remaining command, failing its promise with `err`. Used
    /// on shutdown.
    pub fn drain_failing(&mut self, fail: impl Fn(&Arc<Promise<CommandOutcome>>)) {
        for cmd in self.queue.drain(..) {
            if let Some(p) = cmd.promise {
                fail(&p);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn poll_cmd() -> QueuedCommand {
        QueuedCommand::new(CommandKind::Poll, json!({"ack": []}), CommandContext::Poll, None)
    }

    fn unsubscribe_cmd(name: &str) -> QueuedCommand {
        let subject = crate::model::Subject::new(name);
        QueuedCommand::new(
            CommandKind::Unsubscribe,
            json!({"subject": subject}),
            CommandContext::Unsubscribe { subject },
            None,
        )
    }

    fn name_of(cmd: &QueuedCommand) -> &str {
        match &cmd.context {
            CommandContext::Unsubscribe { subject } => subject.name.as_str(),
            _ => panic!("expected an unsubscribe command"),
        }
    }

    #[test]
    fn detach_empties_and_preserves_order() {
        let mut q = CommandQueue::new();
        q.push_back(poll_cmd());
        q.push_back(poll_cmd());
        let detached = q.detach();
        assert_eq!(detached.len(), 2);
        assert!(q.is_empty());
    }

    #[test]
    fn requeue_back_appends_retries_behind_new_submissions() {
        let mut q = CommandQueue::new();
        // Simulate a new submission that arrived while the cycle was in flight.
        q.push_back(unsubscribe_cmd("new"));

        let retry_set = vec![unsubscribe_cmd("retry-1"), unsubscribe_cmd("retry-2")];
        q.requeue_back(retry_set);

        let drained = q.detach();
        let names: Vec<&str> = drained.iter().map(name_of).collect();
        assert_eq!(names, vec!["new", "retry-1", "retry-2"]);
    }

    #[test]
    fn wire_names_match_spec() {
        assert_eq!(CommandKind::Poll.wire_name(), "poll");
        assert_eq!(CommandKind::Subscribe.wire_name(), "subscribe");
        assert_eq!(CommandKind::Unsubscribe.wire_name(), "unsubscribe");
        assert_eq!(CommandKind::SendMessage.wire_name(), "sendMessage");
    }
}
