//! WebSocket protocol message types
//!
//! Every frame is an envelope `{type, payload, error?}`. Clients send
//! `vote`, `reveal`, `next`, `previous` and `leave`; the server sends
//! `roomState` after each change and `error` when it could not read a frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::room::RoomRecord;

/// Raw envelope as it travels on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Estimate for a ticket. `vote` is `None` when the payload did not carry
    /// an integral number.
    Vote {
        ticket_id: String,
        vote: Option<i64>,
    },
    Reveal,
    Next,
    Previous,
    Leave,
    /// A `vote` whose payload is not `{ticketId, vote}`
    MalformedVote,
    Unknown(String),
}

impl ClientMessage {
    /// Parse a text frame
    ///
    /// Fails only when the frame is not an envelope at all. Unknown types and
    /// bad vote payloads are returned as values so the caller can log them.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(text)?;
        Ok(Self::from_envelope(envelope))
    }

    pub fn from_envelope(envelope: Envelope) -> Self {
        match envelope.kind.as_str() {
            "vote" => parse_vote(&envelope.payload),
            "reveal" => ClientMessage::Reveal,
            "next" => ClientMessage::Next,
            "previous" => ClientMessage::Previous,
            "leave" => ClientMessage::Leave,
            _ => ClientMessage::Unknown(envelope.kind),
        }
    }
}

fn parse_vote(payload: &Value) -> ClientMessage {
    let Some(ticket_id) = payload.get("ticketId").and_then(Value::as_str) else {
        return ClientMessage::MalformedVote;
    };
    let Some(raw) = payload.get("vote") else {
        return ClientMessage::MalformedVote;
    };

    ClientMessage::Vote {
        ticket_id: ticket_id.to_string(),
        vote: integral(raw),
    }
}

/// Accept `5` and `5.0`, reject `5.5`, `"5"` and out-of-range values
fn integral(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    RoomState(RoomRecord),
    Error(String),
}

impl ServerMessage {
    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        Ok(match self {
            ServerMessage::RoomState(record) => Envelope {
                kind: "roomState".to_string(),
                payload: serde_json::to_value(record)?,
                error: None,
            },
            ServerMessage::Error(message) => Envelope {
                kind: "error".to_string(),
                payload: Value::Null,
                error: Some(message.clone()),
            },
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_envelope()?)
    }
}
