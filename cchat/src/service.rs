//! Streaming generation: persist the user turn, format, stream, persist the reply.

use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use ccommon::{MessageId, SessionId};
use futures_util::StreamExt;

use crate::{
    BackendRoute, ChatError, ChatEvent, ChatEventStream, ChatRuntimeHooks, ConversationInput,
    ConversationStore, FormattedConversation, GenerateRequest, GenerationState,
    InMemoryConversationStore, MAX_MESSAGE_CHARS, MessageRole, NewMessage, NoopChatRuntimeHooks,
    ResponseRouter, StoredMessage, assemble_system_prompt, format_structured, format_transcript,
    validate_message_content,
};

/// Appended to a partial response when the backend fails mid-stream.
pub const INTERRUPTION_MARKER: &str = "\n\n[Response interrupted due to error]";

#[derive(Clone)]
pub struct ChatService {
    router: ResponseRouter,
    store: Arc<dyn ConversationStore>,
    hooks: Arc<dyn ChatRuntimeHooks>,
}

pub struct ChatServiceBuilder {
    router: ResponseRouter,
    store: Option<Arc<dyn ConversationStore>>,
    hooks: Option<Arc<dyn ChatRuntimeHooks>>,
}

impl ChatServiceBuilder {
    pub fn new(router: ResponseRouter) -> Self {
        Self {
            router,
            store: None,
            hooks: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn ChatRuntimeHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn build(self) -> ChatService {
        ChatService {
            router: self.router,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryConversationStore::new())),
            hooks: self.hooks.unwrap_or_else(|| Arc::new(NoopChatRuntimeHooks)),
        }
    }
}

/// What passed pre-flight and is ready to run.
struct GenerationPlan {
    session_id: SessionId,
    user_turn: UserTurn,
    regenerate: bool,
}

enum UserTurn {
    Pending(String),
    Persisted(StoredMessage),
}

impl ChatService {
    pub fn new(router: ResponseRouter, store: Arc<dyn ConversationStore>) -> Self {
        Self::builder(router).store(store).build()
    }

    pub fn builder(router: ResponseRouter) -> ChatServiceBuilder {
        ChatServiceBuilder::new(router)
    }

    pub fn store(&self) -> Arc<dyn ConversationStore> {
        Arc::clone(&self.store)
    }

    pub fn hooks(&self) -> Arc<dyn ChatRuntimeHooks> {
        Arc::clone(&self.hooks)
    }

    /// Validates the request, then returns a lazy event stream for one generation.
    ///
    /// Pre-flight failures are returned before any event is produced or anything is
    /// persisted. Once the stream is returned every failure is reported as a terminal
    /// [`ChatEvent::Error`].
    pub async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<ChatEventStream<'static>, ChatError> {
        let started = Instant::now();
        let plan = self.preflight(request, false).await?;

        Ok(self.run(plan, started))
    }

    /// Drops every message after `user_message_id` and answers it again.
    pub async fn regenerate(
        &self,
        session_id: SessionId,
        user_message_id: MessageId,
    ) -> Result<ChatEventStream<'static>, ChatError> {
        let started = Instant::now();
        let request = GenerateRequest::new(session_id, String::new())
            .with_existing_user_message(user_message_id);
        let plan = self.preflight(request, true).await?;

        let messages = self.store.load_messages(session_id).await?;
        let following = messages
            .iter()
            .skip_while(|message| message.id != user_message_id)
            .nth(1);
        if let Some(first_following) = following {
            let deleted = self
                .store
                .delete_message_and_following(first_following.id)
                .await?;
            self.hooks
                .on_messages_deleted(session_id, first_following.id, deleted);
        }

        Ok(self.run(plan, started))
    }

    async fn preflight(
        &self,
        request: GenerateRequest,
        regenerate: bool,
    ) -> Result<GenerationPlan, ChatError> {
        let GenerateRequest {
            session_id,
            user_text,
            existing_user_message_id,
        } = request;

        let user_turn = match existing_user_message_id {
            Some(message_id) => {
                UserTurn::Persisted(self.existing_user_message(session_id, message_id).await?)
            }
            None => {
                validate_message_content(&user_text)?;
                UserTurn::Pending(user_text)
            }
        };

        let snapshot = self.store.load_session(session_id).await?;
        self.router.route(&snapshot)?;

        Ok(GenerationPlan {
            session_id,
            user_turn,
            regenerate,
        })
    }

    async fn existing_user_message(
        &self,
        session_id: SessionId,
        message_id: MessageId,
    ) -> Result<StoredMessage, ChatError> {
        let message = self
            .store
            .get_message(message_id)
            .await?
            .ok_or_else(|| ChatError::not_found(format!("message {message_id} not found")))?;

        if message.session_id != session_id {
            return Err(ChatError::validation(format!(
                "message {message_id} does not belong to session {session_id}"
            )));
        }

        if message.role != MessageRole::User {
            return Err(ChatError::validation(format!(
                "message {message_id} is not a user message"
            )));
        }

        Ok(message)
    }

    fn run(&self, plan: GenerationPlan, started: Instant) -> ChatEventStream<'static> {
        let service = self.clone();

        Box::pin(stream! {
            let GenerationPlan { session_id, user_turn, regenerate } = plan;
            service.hooks.on_generation_start(session_id, regenerate);

            let user_message = match user_turn {
                UserTurn::Persisted(message) => message,
                UserTurn::Pending(text) => {
                    service.enter(session_id, GenerationState::AwaitingUserPersist);
                    match service.store.insert_message(NewMessage::user(session_id, text)).await {
                        Ok(saved) => {
                            yield ChatEvent::UserMessageSaved { user_message_id: saved.id };
                            saved
                        }
                        Err(error) => {
                            yield service.fail(
                                session_id,
                                GenerationState::AwaitingUserPersist,
                                error,
                                started,
                            );
                            return;
                        }
                    }
                }
            };

            service.enter(session_id, GenerationState::Formatting);
            let (route, conversation) = match service.format(session_id, &user_message).await {
                Ok(formatted) => formatted,
                Err(error) => {
                    yield service.fail(session_id, GenerationState::Formatting, error, started);
                    return;
                }
            };

            service.enter(session_id, GenerationState::Streaming);
            service.hooks.on_backend_stream_start(session_id, route.backend_id());
            let mut chunks = match service.router.open(conversation).await {
                Ok(chunks) => chunks,
                Err(error) => {
                    service.enter(session_id, GenerationState::Errored);
                    yield service.fail(session_id, GenerationState::Streaming, error, started);
                    return;
                }
            };

            let mut accumulated = String::new();
            let mut chunk_count = 0usize;
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(chunk) if chunk.is_empty() => {}
                    Ok(chunk) => {
                        accumulated.push_str(&chunk);
                        chunk_count += 1;
                        yield ChatEvent::Content { data: chunk };
                    }
                    Err(error) => {
                        drop(chunks);
                        service.enter(session_id, GenerationState::Errored);
                        service.persist_partial(session_id, &accumulated).await;
                        yield service.fail(
                            session_id,
                            GenerationState::Streaming,
                            error.into(),
                            started,
                        );
                        return;
                    }
                }
            }
            drop(chunks);

            let Some(content) = fit_reply(&accumulated, "") else {
                service.enter(session_id, GenerationState::Done);
                service.hooks.on_generation_complete(
                    session_id,
                    None,
                    chunk_count,
                    started.elapsed(),
                );
                yield ChatEvent::Done { ai_message_id: None };
                return;
            };

            service.enter(session_id, GenerationState::Persisting);
            let reply = NewMessage::assistant(session_id, content);
            match service.store.insert_message(reply).await {
                Ok(saved) => {
                    service.enter(session_id, GenerationState::Done);
                    service.hooks.on_generation_complete(
                        session_id,
                        Some(saved.id),
                        chunk_count,
                        started.elapsed(),
                    );
                    yield ChatEvent::Done { ai_message_id: Some(saved.id) };
                }
                Err(error) => {
                    service.enter(session_id, GenerationState::Errored);
                    yield service.fail(session_id, GenerationState::Persisting, error, started);
                }
            }
        })
    }

    async fn format(
        &self,
        session_id: SessionId,
        user_message: &StoredMessage,
    ) -> Result<(BackendRoute, FormattedConversation), ChatError> {
        let snapshot = self.store.load_session(session_id).await?;
        let route = self.router.route(&snapshot)?;

        let prompt = assemble_system_prompt(&snapshot);
        if prompt.missing_system_prompt {
            self.hooks.on_missing_system_prompt(session_id);
        }

        let history: Vec<StoredMessage> = self
            .store
            .load_messages(session_id)
            .await?
            .into_iter()
            .filter(|message| message.conversation_cmp(user_message).is_lt())
            .collect();

        let input = ConversationInput::from_snapshot(
            &snapshot,
            &prompt.text,
            &history,
            &user_message.content,
        );
        let conversation = match &route {
            BackendRoute::Chat { model } => FormattedConversation::Structured {
                model: model.clone(),
                messages: format_structured(&input),
            },
            BackendRoute::Transcript => FormattedConversation::Transcript {
                system_prompt: prompt.text.clone(),
                transcript: format_transcript(&input),
            },
        };

        Ok((route, conversation))
    }

    /// Best effort: a failure here is reported through hooks and otherwise ignored.
    async fn persist_partial(&self, session_id: SessionId, accumulated: &str) {
        let Some(content) = fit_reply(accumulated, INTERRUPTION_MARKER) else {
            return;
        };

        if let Err(error) = self
            .store
            .insert_message(NewMessage::assistant(session_id, content))
            .await
        {
            self.hooks.on_partial_persist_failure(session_id, &error);
        }
    }

    fn enter(&self, session_id: SessionId, state: GenerationState) {
        self.hooks.on_generation_state(session_id, state);
    }

    /// `state` is where the pipeline stood when it failed.
    fn fail(
        &self,
        session_id: SessionId,
        state: GenerationState,
        error: ChatError,
        started: Instant,
    ) -> ChatEvent {
        self.hooks
            .on_generation_failure(session_id, state, &error, started.elapsed());
        ChatEvent::Error {
            error: error.to_string(),
        }
    }
}

/// Stored form of an assistant reply: `None` when blank, otherwise cut to the message length
/// limit with `suffix` kept intact.
fn fit_reply(accumulated: &str, suffix: &str) -> Option<String> {
    if accumulated.trim().is_empty() {
        return None;
    }

    let budget = MAX_MESSAGE_CHARS.saturating_sub(suffix.chars().count());
    let kept = match accumulated.char_indices().nth(budget) {
        Some((cut, _)) => &accumulated[..cut],
        None => accumulated,
    };
    Some(format!("{kept}{suffix}"))
}
