//! RPC framing: the request/response envelope shapes and the validation
//! that turns a malformed body into a protocol error rather than a partial,
//! silently-wrong application of the response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::OutboundCommand;
use crate::error::CosmoError;
use crate::model::RawEvent;

/// The request envelope sent on every cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    pub client_id: String,
    pub instance_id: String,
    pub commands: Vec<OutboundCommand>,
}

/// One entry of the response envelope's `responses` array.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseItem {
    pub result: String,
    #[serde(default)]
    pub instance_generation: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
}

/// The full response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub profile: Value,
    pub responses: Vec<ResponseItem>,
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

impl ResponseEnvelope {
    /// Parse and shape-validate a response body.
    ///
    /// A malformed envelope (missing top-level keys, non-array `responses`,
    /// a response array shorter than the submitted command count) is a
    /// protocol error — the whole cycle is treated as a transport failure,
    /// never partially applied.
    pub fn parse(body: &str, expected_commands: usize) -> Result<Self, CosmoError> {
        let envelope: ResponseEnvelope = serde_json::from_str(body)
            .map_err(|e| CosmoError::Protocol(format!("malformed response envelope: {e}")))?;

        if envelope.responses.len() != expected_commands {
            return Err(CosmoError::Protocol(format!(
                "expected {expected_commands} responses, got {}",
                envelope.responses.len()
            )));
        }

        Ok(envelope)
    }

    /// The first response's `instance_generation`, present only on the
    /// `poll` command's entry, which is always the envelope's first command.
    pub fn generation(&self) -> Option<&Value> {
        self.responses.first()?.instance_generation.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_well_formed_envelope() {
        let body = serde_json::json!({
            "profile": null,
            "responses": [{"result": "ok", "instance_generation": "gen-1"}],
            "events": []
        })
        .to_string();
        let env = ResponseEnvelope::parse(&body, 1).unwrap();
        assert_eq!(env.responses.len(), 1);
        assert_eq!(env.generation().unwrap(), "gen-1");
    }

    #[test]
    fn parse_rejects_mismatched_response_count() {
        let body = serde_json::json!({
            "profile": null,
            "responses": [{"result": "ok"}],
            "events": []
        })
        .to_string();
        assert!(ResponseEnvelope::parse(&body, 2).is_err());
    }

    #[test]
    fn parse_rejects_missing_responses_key() {
        let body = serde_json::json!({"profile": null, "events": []}).to_string();
        assert!(ResponseEnvelope::parse(&body, 0).is_err());
    }

    #[test]
    fn parse_rejects_non_array_responses() {
        let body = serde_json::json!({"profile": null, "responses": "oops", "events": []}).to_string();
        assert!(ResponseEnvelope::parse(&body, 0).is_err());
    }
}
