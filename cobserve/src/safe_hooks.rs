use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use cchat::{ChatError, ChatRuntimeHooks, GenerationState};
use ccommon::{MessageId, SessionId};
use cprovider::BackendId;

/// Contains panics raised by the wrapped hooks so a misbehaving observer cannot abort a
/// generation stream.
pub struct SafeChatHooks<H> {
    inner: H,
}

impl<H> SafeChatHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ChatRuntimeHooks for SafeChatHooks<H>
where
    H: ChatRuntimeHooks,
{
    fn on_generation_start(&self, session_id: SessionId, regenerate: bool) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_generation_start(session_id, regenerate)
        }));
    }

    fn on_missing_system_prompt(&self, session_id: SessionId) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_missing_system_prompt(session_id)
        }));
    }

    fn on_backend_stream_start(&self, session_id: SessionId, backend: BackendId) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_backend_stream_start(session_id, backend)
        }));
    }

    fn on_generation_state(&self, session_id: SessionId, state: GenerationState) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_generation_state(session_id, state)
        }));
    }

    fn on_generation_complete(
        &self,
        session_id: SessionId,
        ai_message_id: Option<MessageId>,
        chunk_count: usize,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_generation_complete(session_id, ai_message_id, chunk_count, elapsed)
        }));
    }

    fn on_generation_failure(
        &self,
        session_id: SessionId,
        state: GenerationState,
        error: &ChatError,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_generation_failure(session_id, state, error, elapsed)
        }));
    }

    fn on_partial_persist_failure(&self, session_id: SessionId, error: &ChatError) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_partial_persist_failure(session_id, error)
        }));
    }

    fn on_messages_deleted(&self, session_id: SessionId, anchor: MessageId, count: usize) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_messages_deleted(session_id, anchor, count)
        }));
    }
}

/// Forwards every callback to `first`, then `second`.
pub struct CombinedChatHooks<A, B> {
    first: A,
    second: B,
}

impl<A, B> CombinedChatHooks<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A, B> ChatRuntimeHooks for CombinedChatHooks<A, B>
where
    A: ChatRuntimeHooks,
    B: ChatRuntimeHooks,
{
    fn on_generation_start(&self, session_id: SessionId, regenerate: bool) {
        self.first.on_generation_start(session_id, regenerate);
        self.second.on_generation_start(session_id, regenerate);
    }

    fn on_missing_system_prompt(&self, session_id: SessionId) {
        self.first.on_missing_system_prompt(session_id);
        self.second.on_missing_system_prompt(session_id);
    }

    fn on_backend_stream_start(&self, session_id: SessionId, backend: BackendId) {
        self.first.on_backend_stream_start(session_id, backend);
        self.second.on_backend_stream_start(session_id, backend);
    }

    fn on_generation_state(&self, session_id: SessionId, state: GenerationState) {
        self.first.on_generation_state(session_id, state);
        self.second.on_generation_state(session_id, state);
    }

    fn on_generation_complete(
        &self,
        session_id: SessionId,
        ai_message_id: Option<MessageId>,
        chunk_count: usize,
        elapsed: Duration,
    ) {
        self.first
            .on_generation_complete(session_id, ai_message_id, chunk_count, elapsed);
        self.second
            .on_generation_complete(session_id, ai_message_id, chunk_count, elapsed);
    }

    fn on_generation_failure(
        &self,
        session_id: SessionId,
        state: GenerationState,
        error: &ChatError,
        elapsed: Duration,
    ) {
        self.first
            .on_generation_failure(session_id, state, error, elapsed);
        self.second
            .on_generation_failure(session_id, state, error, elapsed);
    }

    fn on_partial_persist_failure(&self, session_id: SessionId, error: &ChatError) {
        self.first.on_partial_persist_failure(session_id, error);
        self.second.on_partial_persist_failure(session_id, error);
    }

    fn on_messages_deleted(&self, session_id: SessionId, anchor: MessageId, count: usize) {
        self.first.on_messages_deleted(session_id, anchor, count);
        self.second.on_messages_deleted(session_id, anchor, count);
    }
}
