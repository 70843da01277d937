//! Metrics-based observability hooks for chat generation.
//!
//! ```rust
//! use cobserve::MetricsObservabilityHooks;
//! use cchat::ChatRuntimeHooks;
//!
//! fn accepts_chat_hooks(_hooks: &dyn ChatRuntimeHooks) {}
//!
//! let hooks = MetricsObservabilityHooks;
//! accepts_chat_hooks(&hooks);
//! ```

use std::time::Duration;

use cchat::{ChatError, ChatRuntimeHooks, GenerationState};
use ccommon::{MessageId, SessionId};
use cprovider::BackendId;

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObservabilityHooks;

impl ChatRuntimeHooks for MetricsObservabilityHooks {
    fn on_generation_start(&self, _session_id: SessionId, regenerate: bool) {
        metrics::counter!(
            "confab_generation_start_total",
            "regenerate" => regenerate.to_string()
        )
        .increment(1);
    }

    fn on_missing_system_prompt(&self, _session_id: SessionId) {
        metrics::counter!("confab_generation_missing_system_prompt_total").increment(1);
    }

    fn on_backend_stream_start(&self, _session_id: SessionId, backend: BackendId) {
        metrics::counter!(
            "confab_backend_stream_start_total",
            "backend" => backend.to_string()
        )
        .increment(1);
    }

    fn on_generation_state(&self, _session_id: SessionId, state: GenerationState) {
        metrics::counter!("confab_generation_state_total", "state" => state.as_str()).increment(1);
    }

    fn on_generation_complete(
        &self,
        _session_id: SessionId,
        _ai_message_id: Option<MessageId>,
        chunk_count: usize,
        elapsed: Duration,
    ) {
        metrics::counter!("confab_generation_success_total").increment(1);
        metrics::histogram!("confab_generation_chunks").record(chunk_count as f64);
        metrics::histogram!("confab_generation_duration_seconds", "status" => "success")
            .record(elapsed.as_secs_f64());
    }

    fn on_generation_failure(
        &self,
        _session_id: SessionId,
        state: GenerationState,
        error: &ChatError,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "confab_generation_failure_total",
            "state" => state.as_str(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!("confab_generation_duration_seconds", "status" => "failure")
            .record(elapsed.as_secs_f64());
    }

    fn on_partial_persist_failure(&self, _session_id: SessionId, error: &ChatError) {
        metrics::counter!(
            "confab_partial_persist_failure_total",
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
    }

    fn on_messages_deleted(&self, _session_id: SessionId, _anchor: MessageId, count: usize) {
        metrics::counter!("confab_messages_deleted_total").increment(count as u64);
    }
}
