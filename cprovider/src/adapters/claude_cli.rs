//! Subprocess backend that drives a line-oriented assistant CLI.
//!
//! The transcript is written to the child's stdin and every stdout line is yielded as
//! soon as it is read. The system prompt travels as a command-line flag.
//!
//! ```rust
//! use cprovider::ClaudeCliConfig;
//!
//! let config = ClaudeCliConfig::default().with_extra_arg("--model").with_extra_arg("sonnet");
//! let args = config.command_args("Be brief.");
//! assert_eq!(args[0], "-p");
//! assert!(args.ends_with(&["--model".to_string(), "sonnet".to_string()]));
//! ```

use std::path::PathBuf;
use std::process::Stdio;

use async_stream::try_stream;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::{BackendId, BoxedChunkStream, ProviderError, ProviderFuture, TranscriptBackend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeCliConfig {
    pub program: PathBuf,
    /// Arguments placed before the system prompt flag.
    pub base_args: Vec<String>,
    pub system_prompt_flag: String,
    pub extra_args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("claude"),
            base_args: vec![
                "-p".to_string(),
                "--output-format".to_string(),
                "text".to_string(),
            ],
            system_prompt_flag: "--system-prompt".to_string(),
            extra_args: Vec::new(),
            working_dir: None,
        }
    }
}

impl ClaudeCliConfig {
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    pub fn command_args(&self, system_prompt: &str) -> Vec<String> {
        let mut args = self.base_args.clone();
        if !system_prompt.is_empty() {
            args.push(self.system_prompt_flag.clone());
            args.push(system_prompt.to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClaudeCliBackend {
    config: ClaudeCliConfig,
}

impl ClaudeCliBackend {
    pub fn new(config: ClaudeCliConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClaudeCliConfig {
        &self.config
    }
}

impl TranscriptBackend for ClaudeCliBackend {
    fn id(&self) -> BackendId {
        BackendId::ClaudeCli
    }

    fn stream<'a>(
        &'a self,
        system_prompt: String,
        transcript: String,
    ) -> ProviderFuture<'a, Result<BoxedChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            let mut command = Command::new(&self.config.program);
            command
                .args(self.config.command_args(&system_prompt))
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);
            if let Some(dir) = &self.config.working_dir {
                command.current_dir(dir);
            }

            let mut child = command.spawn().map_err(|err| {
                ProviderError::process(format!(
                    "failed to spawn '{}': {err}",
                    self.config.program.display()
                ))
            })?;

            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| ProviderError::process("child stdin was not captured"))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| ProviderError::process("child stdout was not captured"))?;
            let mut stderr = child
                .stderr
                .take()
                .ok_or_else(|| ProviderError::process("child stderr was not captured"))?;

            // Both pipes are drained off the reading task so a chatty child cannot block.
            let writer = tokio::spawn(async move {
                let result = stdin.write_all(transcript.as_bytes()).await;
                drop(stdin);
                result
            });
            let stderr_reader = tokio::spawn(async move {
                let mut captured = String::new();
                let _ = stderr.read_to_string(&mut captured).await;
                captured
            });

            let stream = try_stream! {
                let mut reader = BufReader::new(stdout);
                let mut line = String::new();

                loop {
                    line.clear();
                    let read = reader.read_line(&mut line).await.map_err(|err| {
                        ProviderError::process(format!("failed to read child stdout: {err}"))
                    })?;
                    if read == 0 {
                        break;
                    }
                    yield line.clone();
                }

                let status = child.wait().await.map_err(|err| {
                    ProviderError::process(format!("failed to wait for child: {err}"))
                })?;
                let write_result = writer.await.map_err(|err| {
                    ProviderError::process(format!("stdin writer task failed: {err}"))
                })?;
                let captured = stderr_reader.await.unwrap_or_default();

                if !status.success() {
                    let detail = captured.trim();
                    let message = if detail.is_empty() {
                        format!("process exited with {status}")
                    } else {
                        format!("process exited with {status}: {detail}")
                    };
                    Err::<(), _>(ProviderError::process(message))?;
                }

                // A child that exits cleanly without reading all of stdin is not an error.
                if let Err(err) = write_result {
                    if err.kind() != std::io::ErrorKind::BrokenPipe {
                        Err::<(), _>(ProviderError::process(format!(
                            "failed to write transcript: {err}"
                        )))?;
                    }
                }
            };

            Ok(Box::pin(stream) as BoxedChunkStream<'a>)
        })
    }
}
