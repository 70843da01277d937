//! Small convenience helpers for common flows.

use futures_util::StreamExt;

use crate::{ChatEvent, ChatEventStream, GenerateRequest, MessageId, SessionId};

pub fn generate(session_id: SessionId, user_text: impl Into<String>) -> GenerateRequest {
    GenerateRequest::new(session_id, user_text)
}

/// Resumes generation from a user message that is already stored.
pub fn respond_to(session_id: SessionId, user_message_id: MessageId) -> GenerateRequest {
    GenerateRequest::new(session_id, "").with_existing_user_message(user_message_id)
}

/// Drains the stream into one `text/event-stream` body.
pub async fn render_sse(mut events: ChatEventStream<'_>) -> Result<String, serde_json::Error> {
    let mut body = String::new();
    while let Some(event) = events.next().await {
        body.push_str(&event.to_sse_frame()?);
    }
    Ok(body)
}

/// Concatenated `content` payloads, in order.
pub fn reply_text(events: &[ChatEvent]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            ChatEvent::Content { data } => Some(data.as_str()),
            _ => None,
        })
        .collect()
}
