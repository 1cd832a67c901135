//! Message-level contract shared by every transport.
//!
//! Clients send `{"type": "vote", "color": ...}` or `{"type": "reset"}`, optionally
//! with a numeric `id` that the server echoes in its reply to that request.
//! The server pushes [`ServerMessage`] frames tagged as `{"event": ..., "data": ...}`.

use crate::error::PollError;
use crate::tally::{Color, Tally};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// How long a participant waits after a successful vote.
pub const COOLDOWN_SECS: u32 = 10;

/// Granularity of the client-side countdown.
pub const COOLDOWN_TICK: Duration = Duration::from_secs(1);

pub const EVENT_TALLY_UPDATE: &str = "tally-update";
pub const EVENT_COOLDOWN_CLEAR: &str = "cooldown-clear";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    Vote(Color),
    Reset,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawClientMessage {
    Vote { color: Option<serde_json::Value> },
    Reset,
}

#[derive(Deserialize)]
struct RequestId {
    id: Option<u64>,
}

/// Best-effort lookup of the `id` a client attached to a request.
pub fn request_id(text: &str) -> Option<u64> {
    serde_json::from_str::<RequestId>(text).ok().and_then(|r| r.id)
}

impl ClientMessage {
    pub fn from_slice(body: &[u8]) -> Result<Self, PollError> {
        let raw: RawClientMessage = serde_json::from_slice(body)?;
        Self::from_raw(raw)
    }

    pub fn from_text(text: &str) -> Result<Self, PollError> {
        let raw: RawClientMessage = serde_json::from_str(text)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawClientMessage) -> Result<Self, PollError> {
        match raw {
            RawClientMessage::Reset => Ok(ClientMessage::Reset),
            RawClientMessage::Vote { color: None } => Err(PollError::MalformedRequest(
                "vote is missing a color".to_string(),
            )),
            RawClientMessage::Vote {
                color: Some(serde_json::Value::String(color)),
            } => Ok(ClientMessage::Vote(color.parse()?)),
            RawClientMessage::Vote { color: Some(other) } => Err(PollError::MalformedRequest(
                format!("color must be a string, got {other}"),
            )),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ClientMessage::Vote(color) => json!({ "type": "vote", "color": color }),
            ClientMessage::Reset => json!({ "type": "reset" }),
        }
    }

    pub fn to_json_with_id(&self, id: u64) -> serde_json::Value {
        let mut value = self.to_json();
        value["id"] = json!(id);
        value
    }
}

/// Frames pushed from the server over the socket transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Replaces the client's view of the tally. Sent to everyone.
    TallyUpdate(Tally),
    /// Forces every cooldown back to zero. Sent to everyone.
    CooldownClear {},
    /// The origin's own vote or reset was applied.
    Accepted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        tally: Tally,
    },
    /// The origin's request was rejected. Never broadcast.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        error: String,
        details: String,
    },
}

impl ServerMessage {
    pub fn rejected(id: Option<u64>, err: &PollError) -> Self {
        ServerMessage::Error {
            id,
            error: err.label().to_string(),
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vote_and_reset() {
        assert_eq!(
            ClientMessage::from_text(r#"{"type":"vote","color":"neutral"}"#).unwrap(),
            ClientMessage::Vote(Color::Neutral)
        );
        assert_eq!(
            ClientMessage::from_slice(br#"{"type":"reset"}"#).unwrap(),
            ClientMessage::Reset
        );
    }

    #[test]
    fn unknown_color_is_invalid_color() {
        let err = ClientMessage::from_text(r#"{"type":"vote","color":"blue"}"#).unwrap_err();
        assert!(matches!(err, PollError::InvalidColor(_)));
    }

    #[test]
    fn structural_problems_are_malformed() {
        for body in [
            "not json",
            r#"{"color":"agree"}"#,
            r#"{"type":"vote"}"#,
            r#"{"type":"vote","color":3}"#,
            r#"{"type":"shout"}"#,
            "[]",
        ] {
            let err = ClientMessage::from_text(body).unwrap_err();
            assert!(
                matches!(err, PollError::MalformedRequest(_)),
                "{body} gave {err:?}"
            );
        }
    }

    #[test]
    fn server_frames_have_event_and_data() {
        let frame = serde_json::to_value(ServerMessage::TallyUpdate(Tally {
            agree: 1,
            neutral: 0,
            disagree: 2,
        }))
        .unwrap();
        assert_eq!(
            frame,
            json!({"event": "tally-update", "data": {"agree": 1, "neutral": 0, "disagree": 2}})
        );

        let frame = serde_json::to_value(ServerMessage::CooldownClear {}).unwrap();
        assert_eq!(frame, json!({"event": "cooldown-clear", "data": {}}));
    }

    #[test]
    fn request_id_is_read_without_affecting_parsing() {
        let text = ClientMessage::Reset.to_json_with_id(7).to_string();
        assert_eq!(request_id(&text), Some(7));
        assert_eq!(ClientMessage::from_text(&text).unwrap(), ClientMessage::Reset);

        let text = r#"{"type":"vote","color":"blue","id":3}"#;
        assert_eq!(request_id(text), Some(3));
        assert!(matches!(
            ClientMessage::from_text(text),
            Err(PollError::InvalidColor(_))
        ));
        assert_eq!(request_id("not json"), None);
    }

    #[test]
    fn replies_echo_the_request_id() {
        let frame = serde_json::to_value(ServerMessage::rejected(
            Some(4),
            &PollError::Unauthorized,
        ))
        .unwrap();
        assert_eq!(
            frame,
            json!({"event": "error", "data": {"id": 4, "error": "Unauthorized", "details": "Unauthorized"}})
        );
    }

    #[test]
    fn client_message_json_round_trips_through_parser() {
        let text = ClientMessage::Vote(Color::Disagree).to_json().to_string();
        assert_eq!(
            ClientMessage::from_text(&text).unwrap(),
            ClientMessage::Vote(Color::Disagree)
        );
    }
}
