//! Memory backend trait and backend selection.

use std::path::PathBuf;
use std::sync::Arc;

use cchat::{
    AiModel, Character, ChatSession, NewMessage, SessionSnapshot, StoredMessage, SystemPrompt,
    UserProfile,
};
use ccommon::{
    AiModelId, BoxFuture, CharacterId, MessageId, SessionId, SystemPromptId, UserProfileId,
};

use crate::backends::sqlite::default_sqlite_path;
use crate::error::MemoryError;
use crate::types::{
    AiModelDraft, CharacterDraft, SessionDraft, SystemPromptDraft, UserProfileDraft,
};

pub use crate::backends::memory::InMemoryMemoryBackend;
pub use crate::backends::sqlite::SqliteMemoryBackend;

/// Durable storage for configuration entities, sessions, and their messages.
///
/// Deleting a character, user profile, AI model, or system prompt that a session still
/// references fails with a `Conflict` error. Deleting a session removes its messages.
/// Messages are ordered by creation time with the message id as the tie-breaker.
pub trait MemoryBackend: Send + Sync {
    fn create_character<'a>(
        &'a self,
        draft: CharacterDraft,
    ) -> BoxFuture<'a, Result<Character, MemoryError>>;

    fn get_character<'a>(
        &'a self,
        id: CharacterId,
    ) -> BoxFuture<'a, Result<Option<Character>, MemoryError>>;

    fn update_character<'a>(
        &'a self,
        id: CharacterId,
        draft: CharacterDraft,
    ) -> BoxFuture<'a, Result<Character, MemoryError>>;

    fn delete_character<'a>(&'a self, id: CharacterId) -> BoxFuture<'a, Result<(), MemoryError>>;

    fn search_characters<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Character>, MemoryError>>;

    fn create_user_profile<'a>(
        &'a self,
        draft: UserProfileDraft,
    ) -> BoxFuture<'a, Result<UserProfile, MemoryError>>;

    fn get_user_profile<'a>(
        &'a self,
        id: UserProfileId,
    ) -> BoxFuture<'a, Result<Option<UserProfile>, MemoryError>>;

    fn update_user_profile<'a>(
        &'a self,
        id: UserProfileId,
        draft: UserProfileDraft,
    ) -> BoxFuture<'a, Result<UserProfile, MemoryError>>;

    fn delete_user_profile<'a>(
        &'a self,
        id: UserProfileId,
    ) -> BoxFuture<'a, Result<(), MemoryError>>;

    fn search_user_profiles<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<UserProfile>, MemoryError>>;

    fn create_ai_model<'a>(
        &'a self,
        draft: AiModelDraft,
    ) -> BoxFuture<'a, Result<AiModel, MemoryError>>;

    fn get_ai_model<'a>(
        &'a self,
        id: AiModelId,
    ) -> BoxFuture<'a, Result<Option<AiModel>, MemoryError>>;

    fn update_ai_model<'a>(
        &'a self,
        id: AiModelId,
        draft: AiModelDraft,
    ) -> BoxFuture<'a, Result<AiModel, MemoryError>>;

    fn delete_ai_model<'a>(&'a self, id: AiModelId) -> BoxFuture<'a, Result<(), MemoryError>>;

    fn search_ai_models<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<AiModel>, MemoryError>>;

    fn create_system_prompt<'a>(
        &'a self,
        draft: SystemPromptDraft,
    ) -> BoxFuture<'a, Result<SystemPrompt, MemoryError>>;

    fn get_system_prompt<'a>(
        &'a self,
        id: SystemPromptId,
    ) -> BoxFuture<'a, Result<Option<SystemPrompt>, MemoryError>>;

    fn update_system_prompt<'a>(
        &'a self,
        id: SystemPromptId,
        draft: SystemPromptDraft,
    ) -> BoxFuture<'a, Result<SystemPrompt, MemoryError>>;

    fn delete_system_prompt<'a>(
        &'a self,
        id: SystemPromptId,
    ) -> BoxFuture<'a, Result<(), MemoryError>>;

    fn search_system_prompts<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<SystemPrompt>, MemoryError>>;

    /// Fails with `NotFound` when a referenced entity does not exist.
    fn create_session<'a>(
        &'a self,
        draft: SessionDraft,
    ) -> BoxFuture<'a, Result<ChatSession, MemoryError>>;

    fn get_session<'a>(
        &'a self,
        id: SessionId,
    ) -> BoxFuture<'a, Result<Option<ChatSession>, MemoryError>>;

    /// The session with every reference resolved.
    fn load_session_snapshot<'a>(
        &'a self,
        id: SessionId,
    ) -> BoxFuture<'a, Result<Option<SessionSnapshot>, MemoryError>>;

    fn update_session<'a>(
        &'a self,
        id: SessionId,
        draft: SessionDraft,
    ) -> BoxFuture<'a, Result<ChatSession, MemoryError>>;

    /// Removes the session and all of its messages in one transaction.
    fn delete_session<'a>(&'a self, id: SessionId) -> BoxFuture<'a, Result<(), MemoryError>>;

    fn search_sessions<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ChatSession>, MemoryError>>;

    fn list_messages<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, MemoryError>>;

    /// The last `count` messages, oldest first.
    fn latest_messages<'a>(
        &'a self,
        session_id: SessionId,
        count: usize,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, MemoryError>>;

    /// Newest first, skipping `offset` messages.
    fn message_page<'a>(
        &'a self,
        session_id: SessionId,
        offset: usize,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, MemoryError>>;

    fn count_messages<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<usize, MemoryError>>;

    fn get_message<'a>(
        &'a self,
        id: MessageId,
    ) -> BoxFuture<'a, Result<Option<StoredMessage>, MemoryError>>;

    /// Stores the message and refreshes the session's last activity timestamp.
    fn insert_message<'a>(
        &'a self,
        message: NewMessage,
    ) -> BoxFuture<'a, Result<StoredMessage, MemoryError>>;

    fn update_message_content<'a>(
        &'a self,
        id: MessageId,
        content: String,
    ) -> BoxFuture<'a, Result<StoredMessage, MemoryError>>;

    /// Deletes the message and every later message of its session; returns the count.
    fn delete_message_and_following<'a>(
        &'a self,
        id: MessageId,
    ) -> BoxFuture<'a, Result<usize, MemoryError>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryBackendConfig {
    Sqlite { path: PathBuf },
    InMemory,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

pub fn create_memory_backend(
    config: MemoryBackendConfig,
) -> Result<Arc<dyn MemoryBackend>, MemoryError> {
    match config {
        MemoryBackendConfig::Sqlite { path } => Ok(Arc::new(SqliteMemoryBackend::new(path)?)),
        MemoryBackendConfig::InMemory => Ok(Arc::new(InMemoryMemoryBackend::new())),
    }
}

pub fn create_default_memory_backend() -> Result<Arc<dyn MemoryBackend>, MemoryError> {
    create_memory_backend(MemoryBackendConfig::default())
}
