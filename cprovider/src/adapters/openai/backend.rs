//! reqwest-based streaming client for chat-completions compatible endpoints.

use std::time::Duration;

use async_stream::try_stream;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};

use crate::{BackendId, BoxedChunkStream, ChatBackend, Message, ProviderError, ProviderFuture};

use super::serde_api::{build_api_request, extract_error_message};
use super::sse::{LineBuffer, SseLine, classify_line, delta_content};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiChatConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for OpenAiChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(90),
        }
    }
}

impl OpenAiChatConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiChatBackend {
    client: Client,
    config: OpenAiChatConfig,
}

impl OpenAiChatBackend {
    pub fn new(config: OpenAiChatConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ProviderError::transport(err.to_string()))?;

        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: OpenAiChatConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &OpenAiChatConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn parse_error(response: Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        status_error(status, &body)
    }
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let message = extract_error_message(body)
        .unwrap_or_else(|| format!("chat request failed with status {status}"));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::authentication(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ProviderError::timeout(message)
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::invalid_request(message)
        }
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
            ProviderError::unavailable(message)
        }
        _ => ProviderError::transport(message),
    }
}

fn request_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout(err.to_string())
    } else {
        ProviderError::transport(err.to_string())
    }
}

impl ChatBackend for OpenAiChatBackend {
    fn id(&self) -> BackendId {
        BackendId::OpenAiChat
    }

    fn stream<'a>(
        &'a self,
        model: String,
        messages: Vec<Message>,
    ) -> ProviderFuture<'a, Result<BoxedChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            let api_request = build_api_request(&model, messages)?;
            let mut builder = self
                .client
                .post(self.endpoint("chat/completions"))
                .json(&api_request);
            if let Some(api_key) = &self.config.api_key {
                builder = builder.bearer_auth(api_key);
            }

            let response = builder.send().await.map_err(request_error)?;
            if !response.status().is_success() {
                return Err(Self::parse_error(response).await);
            }

            let stream = try_stream! {
                let mut body = response.bytes_stream();
                let mut lines = LineBuffer::default();
                let mut finished = false;

                while let Some(item) = body.next().await {
                    let bytes = item.map_err(request_error)?;

                    for line in lines.push(&bytes)? {
                        match classify_line(&line) {
                            SseLine::Data(payload) => {
                                if let Some(content) = delta_content(&payload)? {
                                    yield content;
                                }
                            }
                            SseLine::Done => {
                                finished = true;
                                break;
                            }
                            SseLine::Ignored => {}
                        }
                    }

                    if finished {
                        break;
                    }
                }

                if !finished {
                    if let Some(tail) = lines.finish() {
                        if let SseLine::Data(payload) = classify_line(&tail) {
                            if let Some(content) = delta_content(&payload)? {
                                yield content;
                            }
                        }
                    }
                }
            };

            Ok(Box::pin(stream) as BoxedChunkStream<'a>)
        })
    }
}
