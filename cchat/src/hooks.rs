//! Runtime hook contracts for observing generation and message lifecycle events.
//!
//! ```rust
//! use cchat::{ChatRuntimeHooks, NoopChatRuntimeHooks};
//!
//! fn accepts_hooks(_hooks: &dyn ChatRuntimeHooks) {}
//!
//! let hooks = NoopChatRuntimeHooks;
//! accepts_hooks(&hooks);
//! ```

use std::time::Duration;

use ccommon::{MessageId, SessionId};
use cprovider::BackendId;

use crate::{ChatError, GenerationState};

pub trait ChatRuntimeHooks: Send + Sync {
    fn on_generation_start(&self, _session_id: SessionId, _regenerate: bool) {}

    /// The session resolved no system prompt entity; generation continues without it.
    fn on_missing_system_prompt(&self, _session_id: SessionId) {}

    fn on_backend_stream_start(&self, _session_id: SessionId, _backend: BackendId) {}

    /// The pipeline entered `state`. `Errored` is entered only from `Streaming` or `Persisting`.
    fn on_generation_state(&self, _session_id: SessionId, _state: GenerationState) {}

    fn on_generation_complete(
        &self,
        _session_id: SessionId,
        _ai_message_id: Option<MessageId>,
        _chunk_count: usize,
        _elapsed: Duration,
    ) {
    }

    fn on_generation_failure(
        &self,
        _session_id: SessionId,
        _state: GenerationState,
        _error: &ChatError,
        _elapsed: Duration,
    ) {
    }

    /// Saving the interrupted partial response failed; the failure is otherwise swallowed.
    fn on_partial_persist_failure(&self, _session_id: SessionId, _error: &ChatError) {}

    fn on_messages_deleted(&self, _session_id: SessionId, _anchor: MessageId, _count: usize) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChatRuntimeHooks;

impl ChatRuntimeHooks for NoopChatRuntimeHooks {}
