//! Wire protocol for the stream socket.
//!
//! Frames are JSON text. The server pushes:
//!   {"event": "new", "id": <id>}
//!   {"event": "content", "contents": [{"id": <id>, "rendered": "..."}, ...]}
//! The client sends:
//!   {"action": "load_content", "ids": [<id>, ...]}

use serde::{Deserialize, Serialize};

use crate::types::{ContentId, ContentItem};

/// Events pushed by the stream server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamEvent {
    /// A new post exists; only its id is announced.
    New { id: ContentId },
    /// Rendered fragments for a previous load_content request.
    Content { contents: Vec<ContentItem> },
}

/// Requests sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientRequest {
    LoadContent { ids: Vec<ContentId> },
}

/// A frame that could not be understood. Fatal for that frame only; the
/// session and the pending buffer are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl StreamEvent {
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("wire enums always serialize")
    }
}

impl ClientRequest {
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("wire enums always serialize")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_new_event() {
        let event = StreamEvent::parse(r#"{"event": "new", "id": 7}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::New {
                id: ContentId::Number(7)
            }
        );
    }

    #[test]
    fn test_parse_content_event() {
        let raw = r#"{"event": "content", "contents": [{"id": 1, "rendered": "<p>x</p>"}]}"#;
        let event = StreamEvent::parse(raw).unwrap();
        match event {
            StreamEvent::Content { contents } => {
                assert_eq!(contents.len(), 1);
                assert_eq!(contents[0].id, ContentId::Number(1));
                assert_eq!(contents[0].rendered, "<p>x</p>");
            }
            other => panic!("expected content event, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_load_content() {
        let request = ClientRequest::LoadContent {
            ids: vec![ContentId::Number(1), ContentId::Text("a".to_string())],
        };
        assert_eq!(
            request.encode(),
            r#"{"action":"load_content","ids":[1,"a"]}"#
        );
    }

    #[test]
    fn test_malformed_frames_rejected() {
        assert!(StreamEvent::parse("not json").is_err());
        assert!(StreamEvent::parse(r#"{"event": "mystery"}"#).is_err());
        assert!(StreamEvent::parse(r#"{"id": 1}"#).is_err());
    }

    #[test]
    fn test_event_round_trip() {
        let event = StreamEvent::New {
            id: ContentId::Text("p-9".to_string()),
        };
        assert_eq!(StreamEvent::parse(&event.encode()).unwrap(), event);
    }
}
