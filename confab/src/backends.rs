//! Stable backend construction surface for facade consumers.

use std::sync::Arc;

use reqwest::Client;

use crate::{
    ChatBackend, ClaudeCliBackend, ClaudeCliConfig, OpenAiChatBackend, OpenAiChatConfig,
    ProviderError, TranscriptBackend,
};

/// Builds the chat-completions backend with a client that honors the configured timeout.
///
/// A missing API key is allowed so that local, unauthenticated endpoints keep working.
pub fn build_chat_backend(config: OpenAiChatConfig) -> Result<Arc<dyn ChatBackend>, ProviderError> {
    let base_url = config.base_url.trim().trim_end_matches('/').to_string();
    if base_url.is_empty() {
        return Err(ProviderError::invalid_request(
            "chat backend base URL must not be empty",
        ));
    }

    let api_key = config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string);

    let http = Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|err| ProviderError::transport(err.to_string()))?;

    Ok(Arc::new(OpenAiChatBackend::with_client(
        http,
        OpenAiChatConfig {
            base_url,
            api_key,
            timeout: config.timeout,
        },
    )))
}

pub fn build_transcript_backend(config: ClaudeCliConfig) -> Arc<dyn TranscriptBackend> {
    Arc::new(ClaudeCliBackend::new(config))
}
