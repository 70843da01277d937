//! Message lifecycle: create, edit, cascade-delete, and paged reads.

use std::sync::Arc;

use ccommon::{MessageId, SessionId};

use crate::{
    ChatError, ChatRuntimeHooks, ConversationStore, MessageRole, NewMessage, NoopChatRuntimeHooks,
    StoredMessage, validate_message_content,
};

/// One page of a conversation, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePage {
    pub items: Vec<StoredMessage>,
    pub total: usize,
    pub total_pages: usize,
    pub page: usize,
    pub page_size: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Clone)]
pub struct MessageService {
    store: Arc<dyn ConversationStore>,
    hooks: Arc<dyn ChatRuntimeHooks>,
}

impl MessageService {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            store,
            hooks: Arc::new(NoopChatRuntimeHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ChatRuntimeHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub async fn create(
        &self,
        session_id: SessionId,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Result<StoredMessage, ChatError> {
        let content = content.into();
        self.require_session(session_id).await?;
        validate_message_content(&content)?;

        self.store
            .insert_message(NewMessage::new(session_id, role, content))
            .await
    }

    pub async fn get(&self, message_id: MessageId) -> Result<StoredMessage, ChatError> {
        self.store
            .get_message(message_id)
            .await?
            .ok_or_else(|| ChatError::not_found(format!("message {message_id} not found")))
    }

    /// Replaces the content only; role and session never change.
    pub async fn update(
        &self,
        message_id: MessageId,
        content: impl Into<String>,
    ) -> Result<StoredMessage, ChatError> {
        let content = content.into();
        self.get(message_id).await?;
        validate_message_content(&content)?;

        self.store.update_message_content(message_id, content).await
    }

    /// Deletes the message and everything after it in the same session.
    pub async fn delete(&self, message_id: MessageId) -> Result<usize, ChatError> {
        let anchor = self.get(message_id).await?;
        let deleted = self.store.delete_message_and_following(message_id).await?;
        self.hooks
            .on_messages_deleted(anchor.session_id, message_id, deleted);
        Ok(deleted)
    }

    /// The last `count` messages, oldest first.
    pub async fn get_latest(
        &self,
        session_id: SessionId,
        count: usize,
    ) -> Result<Vec<StoredMessage>, ChatError> {
        self.require_session(session_id).await?;
        self.store.load_latest_messages(session_id, count).await
    }

    /// 1-indexed pages over the conversation in descending order.
    pub async fn get_paged(
        &self,
        session_id: SessionId,
        page: usize,
        page_size: usize,
    ) -> Result<MessagePage, ChatError> {
        if page < 1 {
            return Err(ChatError::validation("page must be at least 1"));
        }
        if page_size < 1 {
            return Err(ChatError::validation("page_size must be at least 1"));
        }
        self.require_session(session_id).await?;

        let total = self.store.count_messages(session_id).await?;
        let total_pages = total.div_ceil(page_size);
        let offset = (page - 1).saturating_mul(page_size);
        let items = self
            .store
            .load_message_page(session_id, offset, page_size)
            .await?;

        Ok(MessagePage {
            items,
            total,
            total_pages,
            page,
            page_size,
            has_next: page < total_pages,
            has_previous: page > 1,
        })
    }

    async fn require_session(&self, session_id: SessionId) -> Result<(), ChatError> {
        if self.store.session_exists(session_id).await? {
            Ok(())
        } else {
            Err(ChatError::not_found(format!("session {session_id} not found")))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::{
        ChatErrorKind, ChatSession, InMemoryConversationStore, MAX_MESSAGE_CHARS, SessionSnapshot,
    };

    const SESSION: SessionId = SessionId::new(1);
    const OTHER: SessionId = SessionId::new(2);

    #[derive(Default)]
    struct DeleteLog {
        deleted: Mutex<Vec<(SessionId, MessageId, usize)>>,
    }

    impl ChatRuntimeHooks for DeleteLog {
        fn on_messages_deleted(&self, session_id: SessionId, anchor: MessageId, count: usize) {
            self.deleted
                .lock()
                .expect("deleted lock")
                .push((session_id, anchor, count));
        }
    }

    fn store() -> Arc<InMemoryConversationStore> {
        let store = Arc::new(InMemoryConversationStore::new());
        for id in [SESSION, OTHER] {
            store
                .put_session(SessionSnapshot::new(ChatSession::new(id, "s")))
                .expect("seed session");
        }
        store
    }

    async fn seeded(count: usize) -> (MessageService, Vec<StoredMessage>) {
        let service = MessageService::new(store());
        let mut messages = Vec::new();
        for index in 0..count {
            let role = if index % 2 == 0 {
                MessageRole::User
            } else {
                MessageRole::Assistant
            };
            messages.push(
                service
                    .create(SESSION, role, format!("m{index}"))
                    .await
                    .expect("create"),
            );
        }
        (service, messages)
    }

    #[tokio::test]
    async fn create_validates_session_and_content() {
        let service = MessageService::new(store());

        let missing = service
            .create(SessionId::new(9), MessageRole::User, "hi")
            .await
            .expect_err("unknown session");
        assert_eq!(missing.kind, ChatErrorKind::NotFound);

        let blank = service
            .create(SESSION, MessageRole::User, "   ")
            .await
            .expect_err("blank content");
        assert_eq!(blank.kind, ChatErrorKind::Validation);

        let long = service
            .create(SESSION, MessageRole::User, "x".repeat(MAX_MESSAGE_CHARS + 1))
            .await
            .expect_err("overlong content");
        assert_eq!(long.kind, ChatErrorKind::Validation);

        let created = service
            .create(SESSION, MessageRole::Assistant, "hello")
            .await
            .expect("create");
        assert_eq!(created.role, MessageRole::Assistant);
        assert_eq!(service.get(created.id).await.expect("get"), created);
    }

    #[tokio::test]
    async fn create_refreshes_session_activity() {
        let store = store();
        let before = store.load_session(SESSION).await.expect("load").session.last_activity_at;
        std::thread::sleep(Duration::from_millis(5));

        MessageService::new(store.clone())
            .create(SESSION, MessageRole::User, "hi")
            .await
            .expect("create");

        let after = store.load_session(SESSION).await.expect("load").session.last_activity_at;
        assert!(after > before);
        assert!(after <= SystemTime::now());
    }

    #[tokio::test]
    async fn update_changes_content_only() {
        let (service, messages) = seeded(2).await;

        let updated = service
            .update(messages[1].id, "edited")
            .await
            .expect("update");
        assert_eq!(updated.content, "edited");
        assert_eq!(updated.role, messages[1].role);
        assert_eq!(updated.session_id, messages[1].session_id);

        let missing = service
            .update(MessageId::new(404), "edited")
            .await
            .expect_err("unknown message");
        assert_eq!(missing.kind, ChatErrorKind::NotFound);

        let blank = service
            .update(messages[0].id, "")
            .await
            .expect_err("blank content");
        assert_eq!(blank.kind, ChatErrorKind::Validation);
        assert_eq!(service.get(messages[0].id).await.expect("get").content, "m0");
    }

    #[tokio::test]
    async fn delete_cascades_to_following_messages_only() {
        let (service, messages) = seeded(5).await;
        let other = service
            .create(OTHER, MessageRole::User, "elsewhere")
            .await
            .expect("create");

        assert_eq!(service.delete(messages[4].id).await.expect("delete last"), 1);
        assert_eq!(service.delete(messages[2].id).await.expect("delete middle"), 2);

        let remaining = service.get_latest(SESSION, 10).await.expect("latest");
        let ids: Vec<MessageId> = remaining.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![messages[0].id, messages[1].id]);

        assert_eq!(service.delete(messages[0].id).await.expect("delete first"), 2);
        assert!(service.get_latest(SESSION, 10).await.expect("latest").is_empty());
        assert_eq!(service.get(other.id).await.expect("other session untouched"), other);

        let missing = service.delete(messages[0].id).await.expect_err("already deleted");
        assert_eq!(missing.kind, ChatErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_reports_through_hooks() {
        let hooks = Arc::new(DeleteLog::default());
        let (service, messages) = seeded(3).await;
        let service = service.with_hooks(hooks.clone());

        service.delete(messages[1].id).await.expect("delete");
        assert_eq!(
            *hooks.deleted.lock().expect("deleted lock"),
            vec![(SESSION, messages[1].id, 2)]
        );
    }

    #[tokio::test]
    async fn get_latest_returns_tail_in_ascending_order() {
        let (service, messages) = seeded(5).await;

        let latest = service.get_latest(SESSION, 2).await.expect("latest");
        assert_eq!(latest, messages[3..].to_vec());

        let all = service.get_latest(SESSION, 50).await.expect("latest");
        assert_eq!(all, messages);

        assert!(service.get_latest(SESSION, 0).await.expect("latest").is_empty());

        let missing = service
            .get_latest(SessionId::new(9), 2)
            .await
            .expect_err("unknown session");
        assert_eq!(missing.kind, ChatErrorKind::NotFound);
    }

    #[tokio::test]
    async fn get_paged_walks_newest_first() {
        let (service, messages) = seeded(5).await;

        let first = service.get_paged(SESSION, 1, 2).await.expect("page 1");
        assert_eq!(first.total, 5);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next);
        assert!(!first.has_previous);
        assert_eq!(
            first.items.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![messages[4].id, messages[3].id]
        );

        let last = service.get_paged(SESSION, 3, 2).await.expect("page 3");
        assert_eq!(last.items, vec![messages[0].clone()]);
        assert!(!last.has_next);
        assert!(last.has_previous);

        let beyond = service.get_paged(SESSION, 4, 2).await.expect("page 4");
        assert!(beyond.items.is_empty());
    }

    #[tokio::test]
    async fn get_paged_handles_empty_sessions_and_rejects_bad_bounds() {
        let service = MessageService::new(store());

        let empty = service.get_paged(SESSION, 1, 10).await.expect("empty page");
        assert_eq!(empty.total, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_previous);

        let zero_page = service.get_paged(SESSION, 0, 10).await.expect_err("page 0");
        assert_eq!(zero_page.kind, ChatErrorKind::Validation);
        let zero_size = service.get_paged(SESSION, 1, 0).await.expect_err("size 0");
        assert_eq!(zero_size.kind, ChatErrorKind::Validation);
    }
}
