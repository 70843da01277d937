//! Adapter that exposes a memory backend as a cchat `ConversationStore`.

use std::sync::Arc;

use cchat::{ChatError, ConversationStore, NewMessage, SessionSnapshot, StoredMessage};
use ccommon::{BoxFuture, MessageId, SessionId};

use crate::backend::MemoryBackend;
use crate::error::{MemoryError, MemoryErrorKind};

#[derive(Clone)]
pub struct MemoryConversationStore {
    backend: Arc<dyn MemoryBackend>,
}

impl MemoryConversationStore {
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> Arc<dyn MemoryBackend> {
        Arc::clone(&self.backend)
    }
}

impl ConversationStore for MemoryConversationStore {
    fn load_session<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<SessionSnapshot, ChatError>> {
        Box::pin(async move {
            self.backend
                .load_session_snapshot(session_id)
                .await
                .map_err(memory_error_to_chat_error)?
                .ok_or_else(|| ChatError::not_found(format!("session {session_id} not found")))
        })
    }

    fn session_exists<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move {
            self.backend
                .get_session(session_id)
                .await
                .map(|session| session.is_some())
                .map_err(memory_error_to_chat_error)
        })
    }

    fn load_messages<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, ChatError>> {
        Box::pin(async move {
            self.backend
                .list_messages(session_id)
                .await
                .map_err(memory_error_to_chat_error)
        })
    }

    fn load_latest_messages<'a>(
        &'a self,
        session_id: SessionId,
        count: usize,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, ChatError>> {
        Box::pin(async move {
            self.backend
                .latest_messages(session_id, count)
                .await
                .map_err(memory_error_to_chat_error)
        })
    }

    fn load_message_page<'a>(
        &'a self,
        session_id: SessionId,
        offset: usize,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, ChatError>> {
        Box::pin(async move {
            self.backend
                .message_page(session_id, offset, limit)
                .await
                .map_err(memory_error_to_chat_error)
        })
    }

    fn count_messages<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<usize, ChatError>> {
        Box::pin(async move {
            self.backend
                .count_messages(session_id)
                .await
                .map_err(memory_error_to_chat_error)
        })
    }

    fn get_message<'a>(
        &'a self,
        message_id: MessageId,
    ) -> BoxFuture<'a, Result<Option<StoredMessage>, ChatError>> {
        Box::pin(async move {
            self.backend
                .get_message(message_id)
                .await
                .map_err(memory_error_to_chat_error)
        })
    }

    fn insert_message<'a>(
        &'a self,
        message: NewMessage,
    ) -> BoxFuture<'a, Result<StoredMessage, ChatError>> {
        Box::pin(async move {
            self.backend
                .insert_message(message)
                .await
                .map_err(memory_error_to_chat_error)
        })
    }

    fn update_message_content<'a>(
        &'a self,
        message_id: MessageId,
        content: String,
    ) -> BoxFuture<'a, Result<StoredMessage, ChatError>> {
        Box::pin(async move {
            self.backend
                .update_message_content(message_id, content)
                .await
                .map_err(memory_error_to_chat_error)
        })
    }

    fn delete_message_and_following<'a>(
        &'a self,
        message_id: MessageId,
    ) -> BoxFuture<'a, Result<usize, ChatError>> {
        Box::pin(async move {
            self.backend
                .delete_message_and_following(message_id)
                .await
                .map_err(memory_error_to_chat_error)
        })
    }
}

pub fn memory_error_to_chat_error(error: MemoryError) -> ChatError {
    match error.kind {
        MemoryErrorKind::NotFound => ChatError::not_found(error.message),
        MemoryErrorKind::InvalidRequest => ChatError::validation(error.message),
        MemoryErrorKind::Conflict => ChatError::business_rule(error.message),
        MemoryErrorKind::Storage => ChatError::database(error.message),
    }
}
