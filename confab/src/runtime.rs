//! Runtime configuration and wiring for chat and message management.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::backends::{build_chat_backend, build_transcript_backend};
use crate::{
    ChatBackend, ChatRuntimeHooks, ChatService, ClaudeCliConfig, CombinedChatHooks,
    MemoryBackend, MemoryBackendConfig, MemoryConversationStore, MemoryError, MessageService,
    MetricsObservabilityHooks, OpenAiChatConfig, ProviderError, ResponseRouter, SafeChatHooks,
    TracingObservabilityHooks, TranscriptBackend, create_memory_backend,
};

pub const ENV_SQLITE_PATH: &str = "CONFAB_SQLITE_PATH";
pub const ENV_CHAT_BASE_URL: &str = "CONFAB_CHAT_BASE_URL";
pub const ENV_CHAT_API_KEY: &str = "CONFAB_CHAT_API_KEY";
pub const ENV_CHAT_TIMEOUT_SECS: &str = "CONFAB_CHAT_TIMEOUT_SECS";
pub const ENV_CLAUDE_PATH: &str = "CONFAB_CLAUDE_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    Config,
    Memory,
    Backend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Config, message)
    }
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for RuntimeError {}

impl From<MemoryError> for RuntimeError {
    fn from(error: MemoryError) -> Self {
        Self::new(RuntimeErrorKind::Memory, error.to_string())
    }
}

impl From<ProviderError> for RuntimeError {
    fn from(error: ProviderError) -> Self {
        Self::new(RuntimeErrorKind::Backend, error.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub memory: MemoryBackendConfig,
    pub chat: OpenAiChatConfig,
    pub claude: ClaudeCliConfig,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, RuntimeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; unset and blank values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RuntimeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();

        if let Some(path) = read(ENV_SQLITE_PATH) {
            config.memory = MemoryBackendConfig::Sqlite {
                path: PathBuf::from(path),
            };
        }
        if let Some(base_url) = read(ENV_CHAT_BASE_URL) {
            config.chat = config.chat.with_base_url(base_url);
        }
        if let Some(api_key) = read(ENV_CHAT_API_KEY) {
            config.chat = config.chat.with_api_key(api_key);
        }
        if let Some(raw) = read(ENV_CHAT_TIMEOUT_SECS) {
            let seconds = raw.parse::<u64>().map_err(|err| {
                RuntimeError::config(format!(
                    "{ENV_CHAT_TIMEOUT_SECS} must be whole seconds: {err}"
                ))
            })?;
            if seconds == 0 {
                return Err(RuntimeError::config(format!(
                    "{ENV_CHAT_TIMEOUT_SECS} must be greater than zero"
                )));
            }
            config.chat = config.chat.with_timeout(Duration::from_secs(seconds));
        }
        if let Some(program) = read(ENV_CLAUDE_PATH) {
            config.claude = config.claude.with_program(program);
        }

        Ok(config)
    }

    pub fn with_memory(mut self, memory: MemoryBackendConfig) -> Self {
        self.memory = memory;
        self
    }
}

#[derive(Clone)]
pub struct RuntimeBundle {
    pub memory: Arc<dyn MemoryBackend>,
    pub chat: ChatService,
    pub messages: MessageService,
}

/// Tracing and metrics observers behind a panic guard.
pub fn default_hooks() -> Arc<dyn ChatRuntimeHooks> {
    Arc::new(SafeChatHooks::new(CombinedChatHooks::new(
        TracingObservabilityHooks,
        MetricsObservabilityHooks,
    )))
}

pub fn build_runtime(config: RuntimeConfig) -> Result<RuntimeBundle, RuntimeError> {
    let memory = create_memory_backend(config.memory)?;
    let chat = build_chat_backend(config.chat)?;
    let transcript = build_transcript_backend(config.claude);

    Ok(build_runtime_with(memory, chat, transcript, default_hooks()))
}

pub fn build_runtime_with(
    memory: Arc<dyn MemoryBackend>,
    chat: Arc<dyn ChatBackend>,
    transcript: Arc<dyn TranscriptBackend>,
    hooks: Arc<dyn ChatRuntimeHooks>,
) -> RuntimeBundle {
    let store = Arc::new(MemoryConversationStore::new(Arc::clone(&memory)));

    let chat = ChatService::builder(ResponseRouter::new(chat, transcript))
        .store(store.clone())
        .hooks(Arc::clone(&hooks))
        .build();
    let messages = MessageService::new(store).with_hooks(hooks);

    RuntimeBundle {
        memory,
        chat,
        messages,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::StreamExt;

    use crate::{
        AiModelDraft, BackendId, BoxedChunkStream, ChatBackend, ChatEvent, GenerateRequest,
        InMemoryMemoryBackend, MemoryBackend, MemoryBackendConfig, Message, NoopChatRuntimeHooks,
        ProviderError, ProviderFuture, SessionDraft, TranscriptBackend, VecChunkStream,
    };

    use super::{
        ENV_CHAT_API_KEY, ENV_CHAT_TIMEOUT_SECS, ENV_CLAUDE_PATH, ENV_SQLITE_PATH,
        RuntimeConfig, RuntimeErrorKind, build_runtime, build_runtime_with,
    };

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| values.get(key).cloned()
    }

    #[test]
    fn config_reads_overrides_and_keeps_defaults() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            (ENV_SQLITE_PATH, "/tmp/confab-test.sqlite3"),
            (ENV_CHAT_API_KEY, "  sk-test  "),
            (ENV_CHAT_TIMEOUT_SECS, "15"),
            (ENV_CLAUDE_PATH, "/opt/bin/claude"),
        ]))
        .expect("config should parse");

        assert_eq!(
            config.memory,
            MemoryBackendConfig::Sqlite {
                path: PathBuf::from("/tmp/confab-test.sqlite3")
            }
        );
        assert_eq!(config.chat.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.chat.timeout, Duration::from_secs(15));
        assert_eq!(config.chat.base_url, "https://api.openai.com/v1");
        assert_eq!(config.claude.program, PathBuf::from("/opt/bin/claude"));
    }

    #[test]
    fn config_rejects_invalid_timeouts() {
        for raw in ["soon", "0"] {
            let error = RuntimeConfig::from_lookup(lookup(&[(ENV_CHAT_TIMEOUT_SECS, raw)]))
                .expect_err("timeout should be rejected");
            assert_eq!(error.kind, RuntimeErrorKind::Config);
        }
    }

    #[test]
    fn build_runtime_accepts_in_memory_storage() {
        let config = RuntimeConfig::default().with_memory(MemoryBackendConfig::InMemory);
        let runtime = build_runtime(config).expect("runtime should build");
        let _chat = runtime.chat.clone();
        let _messages = runtime.messages.clone();
    }

    struct FixedChat;

    impl ChatBackend for FixedChat {
        fn id(&self) -> BackendId {
            BackendId::OpenAiChat
        }

        fn stream<'a>(
            &'a self,
            _model: String,
            _messages: Vec<Message>,
        ) -> ProviderFuture<'a, Result<BoxedChunkStream<'a>, ProviderError>> {
            Box::pin(async {
                Ok(Box::pin(VecChunkStream::from_chunks(["Well met", ", traveler."]))
                    as BoxedChunkStream<'a>)
            })
        }
    }

    struct FixedTranscript;

    impl TranscriptBackend for FixedTranscript {
        fn id(&self) -> BackendId {
            BackendId::ClaudeCli
        }

        fn stream<'a>(
            &'a self,
            _system_prompt: String,
            _transcript: String,
        ) -> ProviderFuture<'a, Result<BoxedChunkStream<'a>, ProviderError>> {
            Box::pin(async {
                Ok(Box::pin(VecChunkStream::from_chunks(["from the cli"])) as BoxedChunkStream<'a>)
            })
        }
    }

    #[tokio::test]
    async fn runtime_wires_chat_and_messages_to_memory() {
        let memory: Arc<dyn MemoryBackend> = Arc::new(InMemoryMemoryBackend::new());
        let runtime = build_runtime_with(
            memory.clone(),
            Arc::new(FixedChat),
            Arc::new(FixedTranscript),
            Arc::new(NoopChatRuntimeHooks),
        );

        let model = memory
            .create_ai_model(AiModelDraft::new("ClaudeCode"))
            .await
            .expect("model should save");
        let session = memory
            .create_session(SessionDraft::new("Tavern").with_ai_model(model.id))
            .await
            .expect("session should save");

        let events = runtime
            .chat
            .generate(GenerateRequest::new(session.id, "Hello?"))
            .await
            .expect("generation should start")
            .collect::<Vec<_>>()
            .await;
        assert!(matches!(events.last(), Some(ChatEvent::Done { .. })));

        let latest = runtime
            .messages
            .get_latest(session.id, 10)
            .await
            .expect("latest should load");
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[1].content, "from the cli");
    }
}
