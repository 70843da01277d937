//! Tracing-based observability hooks for chat generation.
//!
//! ```rust
//! use cobserve::TracingObservabilityHooks;
//! use cchat::ChatRuntimeHooks;
//!
//! fn accepts_chat_hooks(_hooks: &dyn ChatRuntimeHooks) {}
//!
//! let hooks = TracingObservabilityHooks;
//! accepts_chat_hooks(&hooks);
//! ```

use std::time::Duration;

use cchat::{ChatError, ChatRuntimeHooks, GenerationState};
use ccommon::{MessageId, SessionId};
use cprovider::BackendId;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservabilityHooks;

impl ChatRuntimeHooks for TracingObservabilityHooks {
    fn on_generation_start(&self, session_id: SessionId, regenerate: bool) {
        tracing::info!(
            phase = "generation",
            event = "start",
            session_id = %session_id,
            regenerate
        );
    }

    fn on_missing_system_prompt(&self, session_id: SessionId) {
        tracing::warn!(
            phase = "generation",
            event = "missing_system_prompt",
            session_id = %session_id
        );
    }

    fn on_backend_stream_start(&self, session_id: SessionId, backend: BackendId) {
        tracing::debug!(
            phase = "generation",
            event = "backend_stream_start",
            session_id = %session_id,
            backend = %backend
        );
    }

    fn on_generation_state(&self, session_id: SessionId, state: GenerationState) {
        tracing::trace!(
            phase = "generation",
            event = "state",
            session_id = %session_id,
            state = state.as_str()
        );
    }

    fn on_generation_complete(
        &self,
        session_id: SessionId,
        ai_message_id: Option<MessageId>,
        chunk_count: usize,
        elapsed: Duration,
    ) {
        tracing::info!(
            phase = "generation",
            event = "complete",
            session_id = %session_id,
            ai_message_id = ai_message_id.map(MessageId::get),
            chunk_count,
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_generation_failure(
        &self,
        session_id: SessionId,
        state: GenerationState,
        error: &ChatError,
        elapsed: Duration,
    ) {
        tracing::error!(
            phase = "generation",
            event = "failure",
            session_id = %session_id,
            state = state.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            error_kind = ?error.kind,
            error = %error
        );
    }

    fn on_partial_persist_failure(&self, session_id: SessionId, error: &ChatError) {
        tracing::error!(
            phase = "generation",
            event = "partial_persist_failure",
            session_id = %session_id,
            error_kind = ?error.kind,
            error = %error
        );
    }

    fn on_messages_deleted(&self, session_id: SessionId, anchor: MessageId, count: usize) {
        tracing::info!(
            phase = "messages",
            event = "deleted",
            session_id = %session_id,
            anchor = anchor.get(),
            count
        );
    }
}
