//! Conversation storage contracts and a basic in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use ccommon::{BoxFuture, MessageId, SessionId};

use crate::{ChatError, NewMessage, SessionSnapshot, StoredMessage};

/// The slice of entity persistence the chat pipeline consumes.
///
/// Message lists are always returned in conversation order unless stated otherwise.
/// Every write that adds, removes, or edits messages is one transaction.
pub trait ConversationStore: Send + Sync {
    /// Loads a session with its character, profile, model, and prompt resolved.
    fn load_session<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<SessionSnapshot, ChatError>>;

    fn session_exists<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<bool, ChatError>>;

    fn load_messages<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, ChatError>>;

    /// The last `count` messages, oldest first.
    fn load_latest_messages<'a>(
        &'a self,
        session_id: SessionId,
        count: usize,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, ChatError>>;

    /// A window over the conversation in descending order.
    fn load_message_page<'a>(
        &'a self,
        session_id: SessionId,
        offset: usize,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, ChatError>>;

    fn count_messages<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<usize, ChatError>>;

    fn get_message<'a>(
        &'a self,
        message_id: MessageId,
    ) -> BoxFuture<'a, Result<Option<StoredMessage>, ChatError>>;

    /// Persists a message and refreshes the owning session's activity timestamp.
    fn insert_message<'a>(
        &'a self,
        message: NewMessage,
    ) -> BoxFuture<'a, Result<StoredMessage, ChatError>>;

    fn update_message_content<'a>(
        &'a self,
        message_id: MessageId,
        content: String,
    ) -> BoxFuture<'a, Result<StoredMessage, ChatError>>;

    /// Deletes the message and every later message of its session; returns the count.
    fn delete_message_and_following<'a>(
        &'a self,
        message_id: MessageId,
    ) -> BoxFuture<'a, Result<usize, ChatError>>;
}

#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    state: Mutex<InMemoryState>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    sessions: HashMap<SessionId, SessionSnapshot>,
    messages: Vec<StoredMessage>,
    next_message_id: i64,
}

impl InMemoryState {
    fn ordered_messages(&self, session_id: SessionId) -> Vec<StoredMessage> {
        let mut messages: Vec<StoredMessage> = self
            .messages
            .iter()
            .filter(|message| message.session_id == session_id)
            .cloned()
            .collect();
        messages.sort_by(StoredMessage::conversation_cmp);
        messages
    }

    fn touch(&mut self, session_id: SessionId) {
        if let Some(snapshot) = self.sessions.get_mut(&session_id) {
            snapshot.session.last_activity_at = SystemTime::now();
        }
    }
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a resolved session.
    pub fn put_session(&self, snapshot: SessionSnapshot) -> Result<(), ChatError> {
        let mut state = self.lock()?;
        state.sessions.insert(snapshot.id(), snapshot);
        Ok(())
    }

    pub fn remove_session(&self, session_id: SessionId) -> Result<bool, ChatError> {
        let mut state = self.lock()?;
        state
            .messages
            .retain(|message| message.session_id != session_id);
        Ok(state.sessions.remove(&session_id).is_some())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, ChatError> {
        self.state
            .lock()
            .map_err(|_| ChatError::database("conversation store lock poisoned"))
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn load_session<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<SessionSnapshot, ChatError>> {
        Box::pin(async move {
            let state = self.lock()?;
            state
                .sessions
                .get(&session_id)
                .cloned()
                .ok_or_else(|| ChatError::not_found(format!("session {session_id} not found")))
        })
    }

    fn session_exists<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move {
            let state = self.lock()?;
            Ok(state.sessions.contains_key(&session_id))
        })
    }

    fn load_messages<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, ChatError>> {
        Box::pin(async move {
            let state = self.lock()?;
            Ok(state.ordered_messages(session_id))
        })
    }

    fn load_latest_messages<'a>(
        &'a self,
        session_id: SessionId,
        count: usize,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, ChatError>> {
        Box::pin(async move {
            let state = self.lock()?;
            let mut messages = state.ordered_messages(session_id);
            let skip = messages.len().saturating_sub(count);
            Ok(messages.split_off(skip))
        })
    }

    fn load_message_page<'a>(
        &'a self,
        session_id: SessionId,
        offset: usize,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, ChatError>> {
        Box::pin(async move {
            let state = self.lock()?;
            Ok(state
                .ordered_messages(session_id)
                .into_iter()
                .rev()
                .skip(offset)
                .take(limit)
                .collect())
        })
    }

    fn count_messages<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<usize, ChatError>> {
        Box::pin(async move {
            let state = self.lock()?;
            Ok(state
                .messages
                .iter()
                .filter(|message| message.session_id == session_id)
                .count())
        })
    }

    fn get_message<'a>(
        &'a self,
        message_id: MessageId,
    ) -> BoxFuture<'a, Result<Option<StoredMessage>, ChatError>> {
        Box::pin(async move {
            let state = self.lock()?;
            Ok(state
                .messages
                .iter()
                .find(|message| message.id == message_id)
                .cloned())
        })
    }

    fn insert_message<'a>(
        &'a self,
        message: NewMessage,
    ) -> BoxFuture<'a, Result<StoredMessage, ChatError>> {
        Box::pin(async move {
            let mut state = self.lock()?;
            if !state.sessions.contains_key(&message.session_id) {
                return Err(ChatError::not_found(format!(
                    "session {} not found",
                    message.session_id
                )));
            }

            state.next_message_id += 1;
            let stored = StoredMessage {
                id: MessageId::new(state.next_message_id),
                session_id: message.session_id,
                role: message.role,
                content: message.content,
                created_at: SystemTime::now(),
            };
            state.messages.push(stored.clone());
            state.touch(stored.session_id);
            Ok(stored)
        })
    }

    fn update_message_content<'a>(
        &'a self,
        message_id: MessageId,
        content: String,
    ) -> BoxFuture<'a, Result<StoredMessage, ChatError>> {
        Box::pin(async move {
            let mut state = self.lock()?;
            let message = state
                .messages
                .iter_mut()
                .find(|message| message.id == message_id)
                .ok_or_else(|| ChatError::not_found(format!("message {message_id} not found")))?;
            message.content = content;
            Ok(message.clone())
        })
    }

    fn delete_message_and_following<'a>(
        &'a self,
        message_id: MessageId,
    ) -> BoxFuture<'a, Result<usize, ChatError>> {
        Box::pin(async move {
            let mut state = self.lock()?;
            let anchor = state
                .messages
                .iter()
                .find(|message| message.id == message_id)
                .cloned()
                .ok_or_else(|| ChatError::not_found(format!("message {message_id} not found")))?;

            let before = state.messages.len();
            state.messages.retain(|message| {
                message.session_id != anchor.session_id
                    || message.conversation_cmp(&anchor).is_lt()
            });
            let deleted = before - state.messages.len();
            state.touch(anchor.session_id);
            Ok(deleted)
        })
    }
}
