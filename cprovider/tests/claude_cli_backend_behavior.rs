#![cfg(all(unix, feature = "backend-claude-cli"))]

use cprovider::{ClaudeCliBackend, ClaudeCliConfig, ProviderErrorKind, TranscriptBackend};
use futures_util::StreamExt;

fn shell_backend(script: &str) -> ClaudeCliBackend {
    // `sh -c <script> sh --system-prompt <prompt>` binds the prompt flag to $1 and $2.
    ClaudeCliBackend::new(
        ClaudeCliConfig::default()
            .with_program("sh")
            .with_base_args(["-c", script, "sh"]),
    )
}

#[tokio::test]
async fn cli_backend_streams_stdout_lines_in_order() {
    let backend = shell_backend("cat; printf 'tail'");

    let mut stream = backend
        .stream(
            "ignored".to_string(),
            "User: Hello\nAssistant: Hi there!\nUser: New message".to_string(),
        )
        .await
        .expect("process should spawn");

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk.expect("chunk should be ok"));
    }

    assert_eq!(
        chunks,
        vec![
            "User: Hello\n".to_string(),
            "Assistant: Hi there!\n".to_string(),
            "User: New messagetail".to_string(),
        ]
    );
}

#[tokio::test]
async fn cli_backend_passes_system_prompt_as_flag_value() {
    let backend = shell_backend("cat > /dev/null; printf '%s|%s' \"$1\" \"$2\"");

    let mut stream = backend
        .stream("You are Aria.".to_string(), "User: hi".to_string())
        .await
        .expect("process should spawn");

    let mut output = String::new();
    while let Some(chunk) = stream.next().await {
        output.push_str(&chunk.expect("chunk should be ok"));
    }

    assert_eq!(output, "--system-prompt|You are Aria.");
}

#[tokio::test]
async fn cli_backend_fails_after_partial_output_on_nonzero_exit() {
    let backend = shell_backend("cat > /dev/null; echo partial; echo 'model crashed' >&2; exit 3");

    let mut stream = backend
        .stream(String::new(), "User: hi".to_string())
        .await
        .expect("process should spawn");

    assert_eq!(
        stream.next().await,
        Some(Ok("partial\n".to_string()))
    );

    let error = stream
        .next()
        .await
        .expect("stream should yield a failure")
        .expect_err("exit status should fail the stream");
    assert_eq!(error.kind, ProviderErrorKind::Process);
    assert!(error.message.contains("model crashed"));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn cli_backend_reports_missing_program() {
    let backend = ClaudeCliBackend::new(
        ClaudeCliConfig::default().with_program("/nonexistent/confab-test-cli"),
    );

    let error = match backend.stream(String::new(), "User: hi".to_string()).await {
        Ok(_) => panic!("spawn should fail"),
        Err(error) => error,
    };
    assert_eq!(error.kind, ProviderErrorKind::Process);
}
