//! Generation requests, pipeline states, and client-facing chat events.

use std::pin::Pin;

use ccommon::{MessageId, SessionId};
use futures_core::Stream;
use serde::{Deserialize, Serialize};

/// One streamed event; the wire shape is `{"type": "...", ...}`.
///
/// ```rust
/// use cchat::ChatEvent;
/// use ccommon::MessageId;
///
/// let frame = ChatEvent::UserMessageSaved { user_message_id: MessageId::new(4) }
///     .to_sse_frame()
///     .expect("event should encode");
/// assert_eq!(frame, "data: {\"type\":\"user_message_saved\",\"user_message_id\":4}\n\n");
///
/// let done = serde_json::to_string(&ChatEvent::Done { ai_message_id: None }).expect("encode");
/// assert_eq!(done, "{\"type\":\"done\",\"ai_message_id\":null}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    UserMessageSaved { user_message_id: MessageId },
    Content { data: String },
    Done { ai_message_id: Option<MessageId> },
    Error { error: String },
}

impl ChatEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Server-sent-events frame: `data: <json>` followed by a blank line.
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

pub type ChatEventStream<'a> = Pin<Box<dyn Stream<Item = ChatEvent> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub session_id: SessionId,
    pub user_text: String,
    /// Reuse an already-persisted user message instead of saving `user_text`.
    pub existing_user_message_id: Option<MessageId>,
}

impl GenerateRequest {
    pub fn new(session_id: SessionId, user_text: impl Into<String>) -> Self {
        Self {
            session_id,
            user_text: user_text.into(),
            existing_user_message_id: None,
        }
    }

    pub fn with_existing_user_message(mut self, message_id: MessageId) -> Self {
        self.existing_user_message_id = Some(message_id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    AwaitingUserPersist,
    Formatting,
    Streaming,
    Persisting,
    Done,
    Errored,
}

impl GenerationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingUserPersist => "awaiting_user_persist",
            Self::Formatting => "formatting",
            Self::Streaming => "streaming",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Errored => "errored",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_type_tags() {
        let content = serde_json::to_value(ChatEvent::Content {
            data: "Hel".to_string(),
        })
        .expect("encode");
        assert_eq!(content, serde_json::json!({"type": "content", "data": "Hel"}));

        let done = serde_json::to_value(ChatEvent::Done {
            ai_message_id: Some(MessageId::new(9)),
        })
        .expect("encode");
        assert_eq!(done, serde_json::json!({"type": "done", "ai_message_id": 9}));

        let error = serde_json::to_value(ChatEvent::Error {
            error: "Stream: boom".to_string(),
        })
        .expect("encode");
        assert_eq!(error, serde_json::json!({"type": "error", "error": "Stream: boom"}));
    }

    #[test]
    fn events_decode_from_wire_shape() {
        let event: ChatEvent =
            serde_json::from_str(r#"{"type":"user_message_saved","user_message_id":3}"#)
                .expect("decode");
        assert_eq!(
            event,
            ChatEvent::UserMessageSaved {
                user_message_id: MessageId::new(3)
            }
        );
    }

    #[test]
    fn only_done_and_error_are_terminal() {
        assert!(ChatEvent::Done { ai_message_id: None }.is_terminal());
        assert!(ChatEvent::Error { error: "x".to_string() }.is_terminal());
        assert!(!ChatEvent::Content { data: "x".to_string() }.is_terminal());
    }

    #[test]
    fn request_builder_sets_existing_message() {
        let request = GenerateRequest::new(SessionId::new(1), "")
            .with_existing_user_message(MessageId::new(5));
        assert_eq!(request.existing_user_message_id, Some(MessageId::new(5)));
    }
}
