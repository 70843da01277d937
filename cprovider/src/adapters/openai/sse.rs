//! Incremental decoding of the chat-completions server-sent event body.

use crate::ProviderError;

use super::serde_api::{OpenAiApiStreamResponse, extract_error_message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseLine {
    Data(String),
    Done,
    Ignored,
}

pub(crate) fn classify_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(payload) = line.strip_prefix("data:") else {
        return SseLine::Ignored;
    };

    let payload = payload.trim();
    if payload == "[DONE]" {
        return SseLine::Done;
    }

    if payload.is_empty() {
        return SseLine::Ignored;
    }

    SseLine::Data(payload.to_string())
}

/// Returns the text delta carried by one `data:` payload, if any.
pub(crate) fn delta_content(payload: &str) -> Result<Option<String>, ProviderError> {
    if let Some(message) = extract_error_message(payload) {
        return Err(ProviderError::unavailable(message));
    }

    let parsed: OpenAiApiStreamResponse =
        serde_json::from_str(payload).map_err(|err| ProviderError::transport(err.to_string()))?;

    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

/// Splits buffered body text into complete lines, leaving any partial line buffered.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, ProviderError> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(newline_index) = self.pending.iter().position(|byte| *byte == b'\n') {
            let line = self.pending.drain(..=newline_index).collect::<Vec<u8>>();
            let line =
                String::from_utf8(line).map_err(|err| ProviderError::transport(err.to_string()))?;
            lines.push(line);
        }

        Ok(lines)
    }

    pub(crate) fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }

        String::from_utf8(self.pending).ok()
    }
}
