use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use cchat::{
    AiModel, Character, ChatSession, NewMessage, SessionSnapshot, StoredMessage, SystemPrompt,
    UserProfile,
};
use ccommon::{
    AiModelId, BoxFuture, CharacterId, MessageId, SessionId, SystemPromptId, UserProfileId,
};

use crate::backend::MemoryBackend;
use crate::error::MemoryError;
use crate::types::{
    AiModelDraft, CatalogEntity, CatalogRow, CharacterDraft, SessionDraft, SystemPromptDraft,
    UserProfileDraft, matches_query,
};

#[derive(Debug, Default)]
pub struct InMemoryMemoryBackend {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct CatalogTable {
    rows: BTreeMap<i64, CatalogRow>,
    last_id: i64,
}

#[derive(Debug, Default)]
struct MemoryState {
    characters: CatalogTable,
    user_profiles: CatalogTable,
    ai_models: CatalogTable,
    system_prompts: CatalogTable,
    sessions: BTreeMap<i64, ChatSession>,
    last_session_id: i64,
    messages: BTreeMap<i64, StoredMessage>,
    last_message_id: i64,
}

/// Where each catalog entity lives inside [`MemoryState`].
trait InMemoryCatalog: CatalogEntity {
    fn table(state: &MemoryState) -> &CatalogTable;

    fn table_mut(state: &mut MemoryState) -> &mut CatalogTable;

    fn referenced_by(session: &ChatSession) -> Option<i64>;
}

impl InMemoryCatalog for Character {
    fn table(state: &MemoryState) -> &CatalogTable {
        &state.characters
    }

    fn table_mut(state: &mut MemoryState) -> &mut CatalogTable {
        &mut state.characters
    }

    fn referenced_by(session: &ChatSession) -> Option<i64> {
        session.character_id.map(i64::from)
    }
}

impl InMemoryCatalog for UserProfile {
    fn table(state: &MemoryState) -> &CatalogTable {
        &state.user_profiles
    }

    fn table_mut(state: &mut MemoryState) -> &mut CatalogTable {
        &mut state.user_profiles
    }

    fn referenced_by(session: &ChatSession) -> Option<i64> {
        session.user_profile_id.map(i64::from)
    }
}

impl InMemoryCatalog for AiModel {
    fn table(state: &MemoryState) -> &CatalogTable {
        &state.ai_models
    }

    fn table_mut(state: &mut MemoryState) -> &mut CatalogTable {
        &mut state.ai_models
    }

    fn referenced_by(session: &ChatSession) -> Option<i64> {
        session.ai_model_id.map(i64::from)
    }
}

impl InMemoryCatalog for SystemPrompt {
    fn table(state: &MemoryState) -> &CatalogTable {
        &state.system_prompts
    }

    fn table_mut(state: &mut MemoryState) -> &mut CatalogTable {
        &mut state.system_prompts
    }

    fn referenced_by(session: &ChatSession) -> Option<i64> {
        session.system_prompt_id.map(i64::from)
    }
}

impl MemoryState {
    fn create<T: InMemoryCatalog>(&mut self, draft: T::Draft) -> Result<T, MemoryError> {
        let (key, body) = T::split_draft(draft)?;
        let now = SystemTime::now();
        let table = T::table_mut(self);
        table.last_id += 1;
        let row = CatalogRow {
            id: table.last_id,
            key,
            body,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(row.id, row.clone());
        Ok(T::from_row(row))
    }

    fn get<T: InMemoryCatalog>(&self, id: T::Id) -> Option<T> {
        let id: i64 = id.into();
        T::table(self).rows.get(&id).cloned().map(T::from_row)
    }

    fn update<T: InMemoryCatalog>(&mut self, id: T::Id, draft: T::Draft) -> Result<T, MemoryError> {
        let id: i64 = id.into();
        let (key, body) = T::split_draft(draft)?;
        let row = T::table_mut(self)
            .rows
            .get_mut(&id)
            .ok_or_else(|| MemoryError::not_found(format!("{} {id} not found", T::NOUN)))?;
        row.key = key;
        row.body = body;
        row.updated_at = SystemTime::now();
        Ok(T::from_row(row.clone()))
    }

    fn delete<T: InMemoryCatalog>(&mut self, id: T::Id) -> Result<(), MemoryError> {
        let id: i64 = id.into();
        if !T::table(self).rows.contains_key(&id) {
            return Err(MemoryError::not_found(format!("{} {id} not found", T::NOUN)));
        }

        let in_use = self
            .sessions
            .values()
            .filter(|session| T::referenced_by(session) == Some(id))
            .count();
        if in_use > 0 {
            return Err(MemoryError::conflict(format!(
                "{} {id} is used by {in_use} session(s)",
                T::NOUN
            )));
        }

        T::table_mut(self).rows.remove(&id);
        Ok(())
    }

    fn search<T: InMemoryCatalog>(&self, query: &str) -> Vec<T> {
        T::table(self)
            .rows
            .values()
            .filter(|row| matches_query(&row.key, query))
            .cloned()
            .map(T::from_row)
            .collect()
    }

    fn check_references(&self, draft: &SessionDraft) -> Result<(), MemoryError> {
        check_reference::<Character>(self, draft.character_id)?;
        check_reference::<UserProfile>(self, draft.user_profile_id)?;
        check_reference::<AiModel>(self, draft.ai_model_id)?;
        check_reference::<SystemPrompt>(self, draft.system_prompt_id)
    }

    fn session_messages(&self, session_id: SessionId) -> Vec<StoredMessage> {
        let mut messages: Vec<StoredMessage> = self
            .messages
            .values()
            .filter(|message| message.session_id == session_id)
            .cloned()
            .collect();
        messages.sort_by(StoredMessage::conversation_cmp);
        messages
    }

    fn touch(&mut self, session_id: SessionId) {
        if let Some(session) = self.sessions.get_mut(&session_id.get()) {
            session.last_activity_at = SystemTime::now();
        }
    }
}

fn check_reference<T: InMemoryCatalog>(
    state: &MemoryState,
    id: Option<T::Id>,
) -> Result<(), MemoryError> {
    let Some(id) = id.map(Into::<i64>::into) else {
        return Ok(());
    };
    if T::table(state).rows.contains_key(&id) {
        Ok(())
    } else {
        Err(MemoryError::not_found(format!("{} {id} not found", T::NOUN)))
    }
}

fn apply_draft(session: &mut ChatSession, draft: SessionDraft) {
    session.name = draft.name;
    session.character_id = draft.character_id;
    session.user_profile_id = draft.user_profile_id;
    session.ai_model_id = draft.ai_model_id;
    session.system_prompt_id = draft.system_prompt_id;
    session.pre_prompt = draft.pre_prompt;
    session.pre_prompt_enabled = draft.pre_prompt_enabled;
    session.post_prompt = draft.post_prompt;
    session.post_prompt_enabled = draft.post_prompt_enabled;
}

impl InMemoryMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, MemoryError> {
        self.state
            .lock()
            .map_err(|_| MemoryError::storage("memory backend lock poisoned"))
    }
}

impl MemoryBackend for InMemoryMemoryBackend {
    fn create_character<'a>(
        &'a self,
        draft: CharacterDraft,
    ) -> BoxFuture<'a, Result<Character, MemoryError>> {
        Box::pin(async move { self.lock()?.create::<Character>(draft) })
    }

    fn get_character<'a>(
        &'a self,
        id: CharacterId,
    ) -> BoxFuture<'a, Result<Option<Character>, MemoryError>> {
        Box::pin(async move { Ok(self.lock()?.get::<Character>(id)) })
    }

    fn update_character<'a>(
        &'a self,
        id: CharacterId,
        draft: CharacterDraft,
    ) -> BoxFuture<'a, Result<Character, MemoryError>> {
        Box::pin(async move { self.lock()?.update::<Character>(id, draft) })
    }

    fn delete_character<'a>(&'a self, id: CharacterId) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move { self.lock()?.delete::<Character>(id) })
    }

    fn search_characters<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Character>, MemoryError>> {
        Box::pin(async move { Ok(self.lock()?.search::<Character>(query)) })
    }

    fn create_user_profile<'a>(
        &'a self,
        draft: UserProfileDraft,
    ) -> BoxFuture<'a, Result<UserProfile, MemoryError>> {
        Box::pin(async move { self.lock()?.create::<UserProfile>(draft) })
    }

    fn get_user_profile<'a>(
        &'a self,
        id: UserProfileId,
    ) -> BoxFuture<'a, Result<Option<UserProfile>, MemoryError>> {
        Box::pin(async move { Ok(self.lock()?.get::<UserProfile>(id)) })
    }

    fn update_user_profile<'a>(
        &'a self,
        id: UserProfileId,
        draft: UserProfileDraft,
    ) -> BoxFuture<'a, Result<UserProfile, MemoryError>> {
        Box::pin(async move { self.lock()?.update::<UserProfile>(id, draft) })
    }

    fn delete_user_profile<'a>(
        &'a self,
        id: UserProfileId,
    ) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move { self.lock()?.delete::<UserProfile>(id) })
    }

    fn search_user_profiles<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<UserProfile>, MemoryError>> {
        Box::pin(async move { Ok(self.lock()?.search::<UserProfile>(query)) })
    }

    fn create_ai_model<'a>(
        &'a self,
        draft: AiModelDraft,
    ) -> BoxFuture<'a, Result<AiModel, MemoryError>> {
        Box::pin(async move { self.lock()?.create::<AiModel>(draft) })
    }

    fn get_ai_model<'a>(
        &'a self,
        id: AiModelId,
    ) -> BoxFuture<'a, Result<Option<AiModel>, MemoryError>> {
        Box::pin(async move { Ok(self.lock()?.get::<AiModel>(id)) })
    }

    fn update_ai_model<'a>(
        &'a self,
        id: AiModelId,
        draft: AiModelDraft,
    ) -> BoxFuture<'a, Result<AiModel, MemoryError>> {
        Box::pin(async move { self.lock()?.update::<AiModel>(id, draft) })
    }

    fn delete_ai_model<'a>(&'a self, id: AiModelId) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move { self.lock()?.delete::<AiModel>(id) })
    }

    fn search_ai_models<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<AiModel>, MemoryError>> {
        Box::pin(async move { Ok(self.lock()?.search::<AiModel>(query)) })
    }

    fn create_system_prompt<'a>(
        &'a self,
        draft: SystemPromptDraft,
    ) -> BoxFuture<'a, Result<SystemPrompt, MemoryError>> {
        Box::pin(async move { self.lock()?.create::<SystemPrompt>(draft) })
    }

    fn get_system_prompt<'a>(
        &'a self,
        id: SystemPromptId,
    ) -> BoxFuture<'a, Result<Option<SystemPrompt>, MemoryError>> {
        Box::pin(async move { Ok(self.lock()?.get::<SystemPrompt>(id)) })
    }

    fn update_system_prompt<'a>(
        &'a self,
        id: SystemPromptId,
        draft: SystemPromptDraft,
    ) -> BoxFuture<'a, Result<SystemPrompt, MemoryError>> {
        Box::pin(async move { self.lock()?.update::<SystemPrompt>(id, draft) })
    }

    fn delete_system_prompt<'a>(
        &'a self,
        id: SystemPromptId,
    ) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move { self.lock()?.delete::<SystemPrompt>(id) })
    }

    fn search_system_prompts<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<SystemPrompt>, MemoryError>> {
        Box::pin(async move { Ok(self.lock()?.search::<SystemPrompt>(query)) })
    }

    fn create_session<'a>(
        &'a self,
        draft: SessionDraft,
    ) -> BoxFuture<'a, Result<ChatSession, MemoryError>> {
        Box::pin(async move {
            draft.validate()?;
            let mut state = self.lock()?;
            state.check_references(&draft)?;

            state.last_session_id += 1;
            let mut session = ChatSession::new(SessionId::new(state.last_session_id), "");
            apply_draft(&mut session, draft);
            state.sessions.insert(session.id.get(), session.clone());
            Ok(session)
        })
    }

    fn get_session<'a>(
        &'a self,
        id: SessionId,
    ) -> BoxFuture<'a, Result<Option<ChatSession>, MemoryError>> {
        Box::pin(async move { Ok(self.lock()?.sessions.get(&id.get()).cloned()) })
    }

    fn load_session_snapshot<'a>(
        &'a self,
        id: SessionId,
    ) -> BoxFuture<'a, Result<Option<SessionSnapshot>, MemoryError>> {
        Box::pin(async move {
            let state = self.lock()?;
            let Some(session) = state.sessions.get(&id.get()).cloned() else {
                return Ok(None);
            };

            let character = session.character_id.and_then(|id| state.get::<Character>(id));
            let user_profile = session
                .user_profile_id
                .and_then(|id| state.get::<UserProfile>(id));
            let ai_model = session.ai_model_id.and_then(|id| state.get::<AiModel>(id));
            let system_prompt = session
                .system_prompt_id
                .and_then(|id| state.get::<SystemPrompt>(id));

            Ok(Some(SessionSnapshot {
                session,
                character,
                user_profile,
                ai_model,
                system_prompt,
            }))
        })
    }

    fn update_session<'a>(
        &'a self,
        id: SessionId,
        draft: SessionDraft,
    ) -> BoxFuture<'a, Result<ChatSession, MemoryError>> {
        Box::pin(async move {
            draft.validate()?;
            let mut state = self.lock()?;
            state.check_references(&draft)?;

            let session = state
                .sessions
                .get_mut(&id.get())
                .ok_or_else(|| MemoryError::not_found(format!("session {id} not found")))?;
            apply_draft(session, draft);
            Ok(session.clone())
        })
    }

    fn delete_session<'a>(&'a self, id: SessionId) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move {
            let mut state = self.lock()?;
            if state.sessions.remove(&id.get()).is_none() {
                return Err(MemoryError::not_found(format!("session {id} not found")));
            }
            state.messages.retain(|_, message| message.session_id != id);
            Ok(())
        })
    }

    fn search_sessions<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ChatSession>, MemoryError>> {
        Box::pin(async move {
            let state = self.lock()?;
            Ok(state
                .sessions
                .values()
                .filter(|session| matches_query(&session.name, query))
                .cloned()
                .collect())
        })
    }

    fn list_messages<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, MemoryError>> {
        Box::pin(async move { Ok(self.lock()?.session_messages(session_id)) })
    }

    fn latest_messages<'a>(
        &'a self,
        session_id: SessionId,
        count: usize,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, MemoryError>> {
        Box::pin(async move {
            let mut messages = self.lock()?.session_messages(session_id);
            let skip = messages.len().saturating_sub(count);
            Ok(messages.split_off(skip))
        })
    }

    fn message_page<'a>(
        &'a self,
        session_id: SessionId,
        offset: usize,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, MemoryError>> {
        Box::pin(async move {
            Ok(self
                .lock()?
                .session_messages(session_id)
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
    ) -> BoxFuture<'a, Result<usize, MemoryError>> {
        Box::pin(async move {
            Ok(self
                .lock()?
                .messages
                .values()
                .filter(|message| message.session_id == session_id)
                .count())
        })
    }

    fn get_message<'a>(
        &'a self,
        id: MessageId,
    ) -> BoxFuture<'a, Result<Option<StoredMessage>, MemoryError>> {
        Box::pin(async move { Ok(self.lock()?.messages.get(&id.get()).cloned()) })
    }

    fn insert_message<'a>(
        &'a self,
        message: NewMessage,
    ) -> BoxFuture<'a, Result<StoredMessage, MemoryError>> {
        Box::pin(async move {
            let mut state = self.lock()?;
            if !state.sessions.contains_key(&message.session_id.get()) {
                return Err(MemoryError::not_found(format!(
                    "session {} not found",
                    message.session_id
                )));
            }

            state.last_message_id += 1;
            let stored = StoredMessage {
                id: MessageId::new(state.last_message_id),
                session_id: message.session_id,
                role: message.role,
                content: message.content,
                created_at: SystemTime::now(),
            };
            state.messages.insert(stored.id.get(), stored.clone());
            state.touch(stored.session_id);
            Ok(stored)
        })
    }

    fn update_message_content<'a>(
        &'a self,
        id: MessageId,
        content: String,
    ) -> BoxFuture<'a, Result<StoredMessage, MemoryError>> {
        Box::pin(async move {
            let mut state = self.lock()?;
            let message = state
                .messages
                .get_mut(&id.get())
                .ok_or_else(|| MemoryError::not_found(format!("message {id} not found")))?;
            message.content = content;
            Ok(message.clone())
        })
    }

    fn delete_message_and_following<'a>(
        &'a self,
        id: MessageId,
    ) -> BoxFuture<'a, Result<usize, MemoryError>> {
        Box::pin(async move {
            let mut state = self.lock()?;
            let anchor = state
                .messages
                .get(&id.get())
                .cloned()
                .ok_or_else(|| MemoryError::not_found(format!("message {id} not found")))?;

            let before = state.messages.len();
            state.messages.retain(|_, message| {
                message.session_id != anchor.session_id
                    || message.conversation_cmp(&anchor).is_lt()
            });
            let deleted = before - state.messages.len();
            state.touch(anchor.session_id);
            Ok(deleted)
        })
    }
}
