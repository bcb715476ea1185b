//! Race room WebSocket frame formats
//!
//! Inbound frames are decoded in two stages: the `type` header first, then
//! the full body only for kinds the relay acts on.

use crate::types::{RaceData, RacetimeUser};
use crate::utils::generate_guid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound frame discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    ChatHistory,
    ChatMessage,
    ChatDelete,
    ChatPurge,
    Error,
    Pong,
    RaceData,
    Unknown,
}

impl FrameKind {
    pub fn from_type(value: &str) -> Self {
        match value {
            "chat.history" => FrameKind::ChatHistory,
            "chat.message" => FrameKind::ChatMessage,
            "chat.delete" => FrameKind::ChatDelete,
            "chat.purge" => FrameKind::ChatPurge,
            "error" => FrameKind::Error,
            "pong" => FrameKind::Pong,
            "race.data" => FrameKind::RaceData,
            _ => FrameKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::ChatHistory => "chat.history",
            FrameKind::ChatMessage => "chat.message",
            FrameKind::ChatDelete => "chat.delete",
            FrameKind::ChatPurge => "chat.purge",
            FrameKind::Error => "error",
            FrameKind::Pong => "pong",
            FrameKind::RaceData => "race.data",
            FrameKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Deserialize)]
struct FrameHeader {
    #[serde(rename = "type")]
    kind: String,
}

/// A chat line posted in a race room
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomChatMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub message_plain: String,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub highlight: bool,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
    /// Absent for system messages
    #[serde(default)]
    pub user: Option<RacetimeUser>,
}

impl RoomChatMessage {
    /// Whether the line came from a person rather than a bot or the room itself
    pub fn is_from_user(&self) -> bool {
        !self.is_bot && !self.is_system
    }
}

#[derive(Debug, Deserialize)]
struct ChatMessageBody {
    message: RoomChatMessage,
}

#[derive(Debug, Deserialize)]
struct RaceDataBody {
    race: RaceData,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    ChatMessage(RoomChatMessage),
    RaceData(Box<RaceData>),
    Error(Vec<String>),
    /// Recognized or unknown kinds the relay ignores
    Other(FrameKind),
}

impl InboundFrame {
    pub fn kind(&self) -> FrameKind {
        match self {
            InboundFrame::ChatMessage(_) => FrameKind::ChatMessage,
            InboundFrame::RaceData(_) => FrameKind::RaceData,
            InboundFrame::Error(_) => FrameKind::Error,
            InboundFrame::Other(kind) => *kind,
        }
    }
}

/// Decode one text frame
pub fn decode_frame(text: &str) -> serde_json::Result<InboundFrame> {
    let header: FrameHeader = serde_json::from_str(text)?;

    let frame = match FrameKind::from_type(&header.kind) {
        FrameKind::ChatMessage => {
            let body: ChatMessageBody = serde_json::from_str(text)?;
            InboundFrame::ChatMessage(body.message)
        }
        FrameKind::RaceData => {
            let body: RaceDataBody = serde_json::from_str(text)?;
            InboundFrame::RaceData(Box::new(body.race))
        }
        FrameKind::Error => {
            let body: ErrorBody = serde_json::from_str(text)?;
            InboundFrame::Error(body.errors)
        }
        other => InboundFrame::Other(other),
    };
    Ok(frame)
}

/// Payload of an outbound chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub message: String,
    pub guid: Uuid,
}

/// Outbound action frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundFrame {
    pub action: &'static str,
    pub data: OutboundMessage,
}

impl OutboundFrame {
    /// Chat message with a fresh deduplication guid
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            action: "message",
            data: OutboundMessage {
                message: text.into(),
                guid: generate_guid(),
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const CHAT_MESSAGE: &str = r#"{
        "type": "chat.message",
        "date": "2021-03-01T18:00:00.000Z",
        "message": {
            "id": "m1",
            "user": {"id": "u1", "name": "colfra"},
            "bot": null,
            "is_bot": false,
            "is_system": false,
            "is_monitor": false,
            "posted_at": "2021-03-01T18:00:00.000Z",
            "message": "<b>hi</b>",
            "message_plain": "hi",
            "highlight": false,
            "delay": 0
        }
    }"#;

    #[test]
    fn test_decode_chat_message() {
        let frame = decode_frame(CHAT_MESSAGE).unwrap();
        match frame {
            InboundFrame::ChatMessage(msg) => {
                assert_eq!(msg.message_plain, "hi");
                assert!(msg.is_from_user());
                assert_eq!(msg.user.unwrap().name, "colfra");
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_system_message_without_user() {
        let text = r#"{"type": "chat.message", "message": {"message_plain": "Race started", "is_system": true, "user": null}}"#;
        let InboundFrame::ChatMessage(msg) = decode_frame(text).unwrap() else {
            panic!("expected chat message");
        };
        assert!(!msg.is_from_user());
        assert!(msg.user.is_none());
    }

    #[test]
    fn test_other_kinds_skip_body_decode() {
        // the body of a pong is never inspected
        let frame = decode_frame(r#"{"type": "pong", "date": 12}"#).unwrap();
        assert_eq!(frame, InboundFrame::Other(FrameKind::Pong));

        let frame = decode_frame(r#"{"type": "chat.purge"}"#).unwrap();
        assert_eq!(frame.kind(), FrameKind::ChatPurge);

        let frame = decode_frame(r#"{"type": "something.new"}"#).unwrap();
        assert_eq!(frame.kind(), FrameKind::Unknown);
    }

    #[test]
    fn test_decode_error_frame() {
        let frame = decode_frame(r#"{"type": "error", "errors": ["Permission denied"]}"#).unwrap();
        assert_eq!(frame, InboundFrame::Error(vec!["Permission denied".to_string()]));
    }

    #[test]
    fn test_decode_race_data_frame() {
        let text = r#"{"type": "race.data", "race": {"name": "twwr/a-b-1", "info": "s4"}}"#;
        let InboundFrame::RaceData(race) = decode_frame(text).unwrap() else {
            panic!("expected race data");
        };
        assert_eq!(race.name, "twwr/a-b-1");
    }

    #[test]
    fn test_malformed_frames_are_errors() {
        assert!(decode_frame("not json").is_err());
        assert!(decode_frame(r#"{"date": "x"}"#).is_err());
        assert!(decode_frame(r#"{"type": "chat.message", "message": 5}"#).is_err());
    }

    #[test]
    fn test_outbound_frame_shape() {
        let frame = OutboundFrame::message("hello");
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();

        assert_eq!(value["action"], "message");
        assert_eq!(value["data"]["message"], "hello");
        let guid = value["data"]["guid"].as_str().unwrap();
        assert!(Uuid::parse_str(guid).is_ok());
    }

    #[test]
    fn test_outbound_guids_are_unique() {
        let a = OutboundFrame::message("same");
        let b = OutboundFrame::message("same");
        assert_ne!(a.data.guid, b.data.guid);
    }
}
