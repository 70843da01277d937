use std::sync::{Arc, Mutex};
use std::time::Duration;

use cchat::{ChatError, ChatRuntimeHooks, GenerationState};
use ccommon::{MessageId, SessionId};
use cprovider::BackendId;

use crate::{
    CombinedChatHooks, MetricsObservabilityHooks, SafeChatHooks, TracingObservabilityHooks,
};

const SESSION: SessionId = SessionId::new(7);

fn exercise_all_callbacks(hooks: &dyn ChatRuntimeHooks) {
    let error = ChatError::stream("backend hung up");

    hooks.on_generation_start(SESSION, false);
    hooks.on_missing_system_prompt(SESSION);
    hooks.on_backend_stream_start(SESSION, BackendId::OpenAiChat);
    hooks.on_generation_state(SESSION, GenerationState::Persisting);
    hooks.on_generation_complete(
        SESSION,
        Some(MessageId::new(3)),
        4,
        Duration::from_millis(25),
    );
    hooks.on_generation_failure(
        SESSION,
        GenerationState::Streaming,
        &error,
        Duration::from_millis(30),
    );
    hooks.on_partial_persist_failure(SESSION, &ChatError::database("disk full"));
    hooks.on_messages_deleted(SESSION, MessageId::new(2), 3);
}

#[test]
fn tracing_hooks_smoke_test_all_callbacks() {
    exercise_all_callbacks(&TracingObservabilityHooks);
}

#[test]
fn metrics_hooks_smoke_test_all_callbacks() {
    exercise_all_callbacks(&MetricsObservabilityHooks);
}

#[derive(Default, Clone)]
struct RecordingChatHooks {
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingChatHooks {
    fn events(&self) -> Vec<&'static str> {
        self.events.lock().expect("events lock").clone()
    }

    fn push(&self, event: &'static str) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl ChatRuntimeHooks for RecordingChatHooks {
    fn on_generation_start(&self, _session_id: SessionId, regenerate: bool) {
        self.push(if regenerate { "regenerate_start" } else { "start" });
    }

    fn on_missing_system_prompt(&self, _session_id: SessionId) {
        self.push("missing_system_prompt");
    }

    fn on_backend_stream_start(&self, _session_id: SessionId, _backend: BackendId) {
        self.push("backend_stream_start");
    }

    fn on_generation_state(&self, _session_id: SessionId, state: GenerationState) {
        self.push(state.as_str());
    }

    fn on_generation_complete(
        &self,
        _session_id: SessionId,
        _ai_message_id: Option<MessageId>,
        _chunk_count: usize,
        _elapsed: Duration,
    ) {
        self.push("complete");
    }

    fn on_generation_failure(
        &self,
        _session_id: SessionId,
        _state: GenerationState,
        _error: &ChatError,
        _elapsed: Duration,
    ) {
        self.push("failure");
    }

    fn on_partial_persist_failure(&self, _session_id: SessionId, _error: &ChatError) {
        self.push("partial_persist_failure");
    }

    fn on_messages_deleted(&self, _session_id: SessionId, _anchor: MessageId, _count: usize) {
        self.push("messages_deleted");
    }
}

struct PanicChatHooks;

impl ChatRuntimeHooks for PanicChatHooks {
    fn on_generation_start(&self, _session_id: SessionId, _regenerate: bool) {
        panic!("generation_start panic");
    }

    fn on_missing_system_prompt(&self, _session_id: SessionId) {
        panic!("missing_system_prompt panic");
    }

    fn on_backend_stream_start(&self, _session_id: SessionId, _backend: BackendId) {
        panic!("backend_stream_start panic");
    }

    fn on_generation_state(&self, _session_id: SessionId, _state: GenerationState) {
        panic!("generation_state panic");
    }

    fn on_generation_complete(
        &self,
        _session_id: SessionId,
        _ai_message_id: Option<MessageId>,
        _chunk_count: usize,
        _elapsed: Duration,
    ) {
        panic!("complete panic");
    }

    fn on_generation_failure(
        &self,
        _session_id: SessionId,
        _state: GenerationState,
        _error: &ChatError,
        _elapsed: Duration,
    ) {
        panic!("failure panic");
    }

    fn on_partial_persist_failure(&self, _session_id: SessionId, _error: &ChatError) {
        panic!("partial_persist_failure panic");
    }

    fn on_messages_deleted(&self, _session_id: SessionId, _anchor: MessageId, _count: usize) {
        panic!("messages_deleted panic");
    }
}

#[test]
fn safe_hooks_forward_every_callback() {
    let recording = RecordingChatHooks::default();
    let hooks = SafeChatHooks::new(recording.clone());

    exercise_all_callbacks(&hooks);

    assert_eq!(
        recording.events(),
        vec![
            "start",
            "missing_system_prompt",
            "backend_stream_start",
            "persisting",
            "complete",
            "failure",
            "partial_persist_failure",
            "messages_deleted",
        ]
    );
}

#[test]
fn safe_hooks_swallow_panics() {
    let hooks = SafeChatHooks::new(PanicChatHooks);
    exercise_all_callbacks(&hooks);
}

#[test]
fn combined_hooks_call_both_observers_in_order() {
    let first = RecordingChatHooks::default();
    let second = RecordingChatHooks::default();
    let hooks = CombinedChatHooks::new(first.clone(), second.clone());

    hooks.on_generation_start(SESSION, true);
    hooks.on_messages_deleted(SESSION, MessageId::new(1), 2);

    assert_eq!(first.events(), vec!["regenerate_start", "messages_deleted"]);
    assert_eq!(second.events(), first.events());
}

#[test]
fn safe_wrapper_isolates_a_panicking_half_of_a_combination() {
    let recording = RecordingChatHooks::default();
    let hooks = CombinedChatHooks::new(SafeChatHooks::new(PanicChatHooks), recording.clone());

    hooks.on_generation_start(SESSION, false);

    assert_eq!(recording.events(), vec!["start"]);
}
