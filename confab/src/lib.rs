//! Unified facade over the confab workspace crates.
//!
//! This crate is the single dependency for most applications. It re-exports the chat,
//! memory, backend, and observability crates and wires them into a ready runtime.
//!
//! ```rust
//! use confab::{MemoryBackendConfig, RuntimeConfig, build_runtime};
//!
//! let config = RuntimeConfig::default().with_memory(MemoryBackendConfig::InMemory);
//! let runtime = build_runtime(config).expect("runtime should build");
//! let _messages = runtime.messages.clone();
//! ```

mod backends;

pub mod prelude;
pub mod runtime;
pub mod util;

pub use cchat;
pub use ccommon;
pub use cmemory;
pub use cobserve;
pub use cprovider;

pub use cchat::{
    AiModel, BackendRoute, Character, ChatError, ChatErrorKind, ChatEvent, ChatEventStream,
    ChatRuntimeHooks, ChatService, ChatServiceBuilder, ChatSession, ConversationStore,
    GenerateRequest, GenerationState, INTERRUPTION_MARKER, InMemoryConversationStore,
    MessagePage, MessageRole, MessageService, NewMessage, NoopChatRuntimeHooks, ResponseRouter,
    SessionSnapshot, StoredMessage, SystemPrompt, TRANSCRIPT_BACKEND_SENTINEL, UserProfile,
};
pub use ccommon::{
    AiModelId, BoxFuture, CharacterId, MessageId, SessionId, SystemPromptId, UserProfileId,
};
pub use cmemory::{
    AiModelDraft, CharacterDraft, InMemoryMemoryBackend, MemoryBackend, MemoryBackendConfig,
    MemoryConversationStore, MemoryError, MemoryErrorKind, SessionDraft, SqliteMemoryBackend,
    SystemPromptDraft, UserProfileDraft, create_default_memory_backend, create_memory_backend,
};
pub use cobserve::{
    CombinedChatHooks, MetricsObservabilityHooks, SafeChatHooks, TracingObservabilityHooks,
};
pub use cprovider::{
    BackendId, BoxedChunkStream, ChatBackend, ClaudeCliBackend, ClaudeCliConfig, Message,
    OpenAiChatBackend, OpenAiChatConfig, ProviderError, ProviderErrorKind, ProviderFuture, Role,
    TranscriptBackend, VecChunkStream,
};

pub use backends::{build_chat_backend, build_transcript_backend};
pub use runtime::{
    RuntimeBundle, RuntimeConfig, RuntimeError, RuntimeErrorKind, build_runtime,
    build_runtime_with, default_hooks,
};
pub use util::{generate, render_sse, reply_text, respond_to};
