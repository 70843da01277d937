//! Chat-completions HTTP payload serde models and conversion helpers.

use serde::{Deserialize, Serialize};

use crate::{Message, ProviderError};

pub(crate) fn build_api_request(
    model: &str,
    messages: Vec<Message>,
) -> Result<OpenAiApiRequest, ProviderError> {
    if model.trim().is_empty() {
        return Err(ProviderError::invalid_request("model must not be empty"));
    }

    if messages.is_empty() {
        return Err(ProviderError::invalid_request(
            "chat request requires at least one message",
        ));
    }

    Ok(OpenAiApiRequest {
        model: model.to_string(),
        messages: messages.into_iter().map(OpenAiApiMessage::from).collect(),
        stream: true,
    })
}

pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<OpenAiApiErrorEnvelope>(body).ok()?;
    Some(parsed.error.message)
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiErrorEnvelope {
    pub error: OpenAiApiError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiError {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiRequest {
    pub model: String,
    pub messages: Vec<OpenAiApiMessage>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiMessage {
    pub role: &'static str,
    pub content: String,
}

impl From<Message> for OpenAiApiMessage {
    fn from(value: Message) -> Self {
        Self {
            role: value.role.as_str(),
            content: value.content,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiStreamResponse {
    #[serde(default)]
    pub choices: Vec<OpenAiApiStreamChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiStreamChoice {
    #[serde(default)]
    pub delta: OpenAiApiStreamDelta,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OpenAiApiStreamDelta {
    pub content: Option<String>,
}
