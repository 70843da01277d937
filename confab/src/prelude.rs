//! Common imports for most confab applications.

pub use crate::{build_runtime, build_runtime_with, default_hooks, generate, respond_to};
pub use crate::{
    AiModelDraft, BoxFuture, CharacterDraft, ChatError, ChatErrorKind, ChatEvent,
    ChatEventStream, ChatRuntimeHooks, ChatService, GenerateRequest, MemoryBackend,
    MemoryBackendConfig, MessageId, MessagePage, MessageService, RuntimeBundle, RuntimeConfig,
    SessionDraft, SessionId, StoredMessage, SystemPromptDraft, UserProfileDraft,
};
