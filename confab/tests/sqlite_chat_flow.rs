use std::sync::Arc;

use confab::{
    AiModelDraft, BackendId, BoxedChunkStream, CharacterDraft, ChatBackend, ChatErrorKind,
    INTERRUPTION_MARKER, MemoryBackend, Message, MessageRole, NoopChatRuntimeHooks,
    ProviderError, ProviderFuture, SessionDraft, SqliteMemoryBackend, SystemPromptDraft,
    TranscriptBackend, UserProfileDraft, VecChunkStream, build_runtime_with, generate,
    render_sse,
};

/// Sends one chunk, then fails, so every reply is interrupted.
struct DroppingChat;

impl ChatBackend for DroppingChat {
    fn id(&self) -> BackendId {
        BackendId::OpenAiChat
    }

    fn stream<'a>(
        &'a self,
        _model: String,
        _messages: Vec<Message>,
    ) -> ProviderFuture<'a, Result<BoxedChunkStream<'a>, ProviderError>> {
        Box::pin(async {
            Ok(Box::pin(VecChunkStream::new(vec![
                Ok("Partial".to_string()),
                Err(ProviderError::transport("connection reset")),
            ])) as BoxedChunkStream<'a>)
        })
    }
}

/// Echoes the system prompt and transcript it was given.
struct EchoTranscript;

impl TranscriptBackend for EchoTranscript {
    fn id(&self) -> BackendId {
        BackendId::ClaudeCli
    }

    fn stream<'a>(
        &'a self,
        system_prompt: String,
        transcript: String,
    ) -> ProviderFuture<'a, Result<BoxedChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            Ok(Box::pin(VecChunkStream::from_chunks([
                format!("[{system_prompt}]"),
                format!("[{transcript}]"),
            ])) as BoxedChunkStream<'a>)
        })
    }
}

fn temp_path(prefix: &str) -> std::path::PathBuf {
    let unique = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    std::env::temp_dir()
        .join(format!("confab-{prefix}-{unique}"))
        .join("confab.sqlite3")
}

#[tokio::test]
async fn interrupted_reply_is_persisted_with_marker_in_sqlite() {
    let path = temp_path("interrupted");
    let memory: Arc<dyn MemoryBackend> =
        Arc::new(SqliteMemoryBackend::new(&path).expect("sqlite should open"));
    let runtime = build_runtime_with(
        memory.clone(),
        Arc::new(DroppingChat),
        Arc::new(EchoTranscript),
        Arc::new(NoopChatRuntimeHooks),
    );

    let model = memory
        .create_ai_model(AiModelDraft::new("gpt-4o-mini"))
        .await
        .expect("model should save");
    let session = memory
        .create_session(SessionDraft::new("Flaky line").with_ai_model(model.id))
        .await
        .expect("session should save");

    let stream = runtime
        .chat
        .generate(generate(session.id, "Tell me a story"))
        .await
        .expect("generation should start");
    let body = render_sse(stream).await.expect("events should serialize");

    let frames: Vec<&str> = body.split_terminator("\n\n").collect();
    assert_eq!(frames.len(), 3, "{body}");
    assert!(frames[0].contains("\"user_message_saved\""));
    assert_eq!(frames[1], "data: {\"type\":\"content\",\"data\":\"Partial\"}");
    assert!(frames[2].contains("\"error\""));

    let stored = memory
        .list_messages(session.id)
        .await
        .expect("messages should load");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].role, MessageRole::Assistant);
    assert_eq!(stored[1].content, format!("Partial{INTERRUPTION_MARKER}"));

    if let Some(root) = path.parent() {
        std::fs::remove_dir_all(root).expect("temporary directory should be removable");
    }
}

#[tokio::test]
async fn cli_sessions_receive_the_assembled_prompt_and_transcript() {
    let memory: Arc<dyn MemoryBackend> =
        Arc::new(SqliteMemoryBackend::new_in_memory().expect("sqlite should open"));
    let runtime = build_runtime_with(
        memory.clone(),
        Arc::new(DroppingChat),
        Arc::new(EchoTranscript),
        Arc::new(NoopChatRuntimeHooks),
    );

    let prompt = memory
        .create_system_prompt(SystemPromptDraft::new("base", "You are a storyteller."))
        .await
        .expect("prompt should save");
    let character = memory
        .create_character(CharacterDraft::new("Aria").with_description("A bard."))
        .await
        .expect("character should save");
    let profile = memory
        .create_user_profile(UserProfileDraft::new("Sam").with_description("A traveler."))
        .await
        .expect("profile should save");
    let model = memory
        .create_ai_model(AiModelDraft::new("ClaudeCode"))
        .await
        .expect("model should save");
    let session = memory
        .create_session(
            SessionDraft::new("By the fire")
                .with_system_prompt(prompt.id)
                .with_character(character.id)
                .with_user_profile(profile.id)
                .with_ai_model(model.id)
                .with_post_prompt("Never break character.", true),
        )
        .await
        .expect("session should save");

    let reply = runtime
        .messages
        .create(session.id, MessageRole::User, "Hello".to_string())
        .await
        .expect("message should save");
    assert_eq!(reply.role, MessageRole::User);

    let stream = runtime
        .chat
        .generate(generate(session.id, "Sing for me"))
        .await
        .expect("generation should start");
    let body = render_sse(stream).await.expect("events should serialize");
    assert!(body.contains("\"done\""), "{body}");

    let latest = runtime
        .messages
        .get_latest(session.id, 1)
        .await
        .expect("latest should load");
    assert_eq!(
        latest[0].content,
        "[You are a storyteller.\n---\nA bard.\n---\nA traveler.][User: Hello\nUser: Sing for me]"
    );

    let error = memory
        .delete_ai_model(model.id)
        .await
        .expect_err("referenced model should not delete");
    assert_eq!(
        confab::cmemory::memory_error_to_chat_error(error).kind,
        ChatErrorKind::BusinessRule
    );
}
