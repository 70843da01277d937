//! Persistence for characters, user profiles, AI models, system prompts, sessions, and
//! messages, with a cchat `ConversationStore` adapter.

mod adapter;
mod backend;
mod backends;
mod error;
mod types;

pub mod prelude {
    pub use crate::{
        AiModelDraft, CharacterDraft, InMemoryMemoryBackend, MemoryBackend, MemoryBackendConfig,
        MemoryConversationStore, MemoryError, MemoryErrorKind, SessionDraft, SqliteMemoryBackend,
        SystemPromptDraft, UserProfileDraft, create_default_memory_backend, create_memory_backend,
    };
}

pub use adapter::{MemoryConversationStore, memory_error_to_chat_error};
pub use backend::{
    InMemoryMemoryBackend, MemoryBackend, MemoryBackendConfig, SqliteMemoryBackend,
    create_default_memory_backend, create_memory_backend,
};
pub use error::{MemoryError, MemoryErrorKind};
pub use types::{AiModelDraft, CharacterDraft, SessionDraft, SystemPromptDraft, UserProfileDraft};
