//! Event dispatcher: classifies `events[]` entries, updates the
//! registry/session state under the client lock, and hands back the
//! callback to fire once the lock is released — user callbacks are as
//! untrusted as I/O, so they never run while the lock is held.

use cosmo_core::model::RawEvent;
use cosmo_core::{InsertOutcome, Message};

use crate::state::{ClientState, SessionState};

/// What the worker should do once it has dropped the client lock.
pub enum DispatchEffect {
    Message(Message),
    Login,
    Logout,
    None,
}

/// Classify and apply one event. Ack bookkeeping happens unconditionally,
/// before classification, so a callback that later panics never costs an
/// ack.
pub fn dispatch(state: &mut ClientState, event: RawEvent) -> DispatchEffect {
    if let Some(event_id) = event.event_id.clone() {
        state.ack_buffer.push(event_id);
    }

    match event.event_type.as_str() {
        "message" => dispatch_message(state, event),
        "login" => {
            if state.session != SessionState::LoggedIn {
                state.session = SessionState::LoggedIn;
                DispatchEffect::Login
            } else {
                DispatchEffect::None
            }
        }
        "logout" => {
            if state.session != SessionState::LoggedOut {
                state.session = SessionState::LoggedOut;
                DispatchEffect::Logout
            } else {
                DispatchEffect::None
            }
        }
        other => {
            tracing::debug!(event_type = other, "dropping unrecognized event type");
            DispatchEffect::None
        }
    }
}

fn dispatch_message(state: &mut ClientState, event: RawEvent) -> DispatchEffect {
    let (Some(subject), Some(id), Some(raw_message)) =
        (event.subject, event.id, event.message)
    else {
        tracing::debug!("dropping malformed message event (missing subject/id/message)");
        return DispatchEffect::None;
    };

    let decoded = match serde_json::from_str(&raw_message) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "dropping message event with undecodable payload");
            return DispatchEffect::None;
        }
    };

    let message = Message {
        subject: subject.clone(),
        id,
        message: decoded,
        event_id: event.event_id,
        sender_message_id: event.sender_message_id,
    };

    match state.registry.insert_message(&subject, message.clone()) {
        InsertOutcome::Inserted => DispatchEffect::Message(message),
        InsertOutcome::Duplicate => {
            tracing::debug!(id, "dropping duplicate message id");
            DispatchEffect::None
        }
        InsertOutcome::UnknownSubject => {
            tracing::debug!(subject = %subject.name, "dropping message for unknown subject");
            DispatchEffect::None
        }
    }
}
