//! Backend selection from a session's model label.
//!
//! ```rust
//! use cchat::BackendRoute;
//!
//! assert_eq!(BackendRoute::from_model_label("ClaudeCode"), BackendRoute::Transcript);
//! assert_eq!(
//!     BackendRoute::from_model_label("gpt-4o-mini"),
//!     BackendRoute::Chat { model: "gpt-4o-mini".to_string() }
//! );
//! ```

use std::sync::Arc;

use cprovider::{BackendId, BoxedChunkStream, ChatBackend, Message, TranscriptBackend};

use crate::{ChatError, SessionSnapshot};

/// Model label that selects the transcript backend instead of the chat backend.
pub const TRANSCRIPT_BACKEND_SENTINEL: &str = "ClaudeCode";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendRoute {
    Chat { model: String },
    Transcript,
}

impl BackendRoute {
    /// Exact, case-sensitive match on the sentinel.
    pub fn from_model_label(label: &str) -> Self {
        if label == TRANSCRIPT_BACKEND_SENTINEL {
            Self::Transcript
        } else {
            Self::Chat {
                model: label.to_string(),
            }
        }
    }

    pub fn backend_id(&self) -> BackendId {
        match self {
            Self::Chat { .. } => BackendId::OpenAiChat,
            Self::Transcript => BackendId::ClaudeCli,
        }
    }
}

/// A conversation rendered for exactly one backend family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormattedConversation {
    Structured {
        model: String,
        messages: Vec<Message>,
    },
    Transcript {
        system_prompt: String,
        transcript: String,
    },
}

#[derive(Clone)]
pub struct ResponseRouter {
    chat: Arc<dyn ChatBackend>,
    transcript: Arc<dyn TranscriptBackend>,
}

impl ResponseRouter {
    pub fn new(chat: Arc<dyn ChatBackend>, transcript: Arc<dyn TranscriptBackend>) -> Self {
        Self { chat, transcript }
    }

    /// Resolves the route for a session; sessions without a usable model cannot generate.
    pub fn route(&self, snapshot: &SessionSnapshot) -> Result<BackendRoute, ChatError> {
        let model = snapshot.ai_model.as_ref().ok_or_else(|| {
            ChatError::business_rule(format!(
                "session {} has no AI model configured",
                snapshot.id()
            ))
        })?;

        if model.label.trim().is_empty() {
            return Err(ChatError::business_rule(format!(
                "AI model {} has an empty label",
                model.id
            )));
        }

        Ok(BackendRoute::from_model_label(&model.label))
    }

    pub async fn open<'a>(
        &'a self,
        conversation: FormattedConversation,
    ) -> Result<BoxedChunkStream<'a>, ChatError> {
        let stream = match conversation {
            FormattedConversation::Structured { model, messages } => {
                self.chat.stream(model, messages).await?
            }
            FormattedConversation::Transcript {
                system_prompt,
                transcript,
            } => self.transcript.stream(system_prompt, transcript).await?,
        };

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use ccommon::{AiModelId, SessionId};
    use cprovider::{ProviderError, ProviderFuture, VecChunkStream};
    use futures_util::StreamExt;

    use super::*;
    use crate::{AiModel, ChatErrorKind, ChatSession};

    struct LabelledChat;

    impl ChatBackend for LabelledChat {
        fn id(&self) -> BackendId {
            BackendId::OpenAiChat
        }

        fn stream<'a>(
            &'a self,
            model: String,
            messages: Vec<Message>,
        ) -> ProviderFuture<'a, Result<BoxedChunkStream<'a>, ProviderError>> {
            Box::pin(async move {
                let chunk = format!("chat:{model}:{}", messages.len());
                Ok(Box::pin(VecChunkStream::from_chunks([chunk])) as BoxedChunkStream<'a>)
            })
        }
    }

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
                let chunk = format!("cli:{system_prompt}:{transcript}");
                Ok(Box::pin(VecChunkStream::from_chunks([chunk])) as BoxedChunkStream<'a>)
            })
        }
    }

    fn router() -> ResponseRouter {
        ResponseRouter::new(Arc::new(LabelledChat), Arc::new(EchoTranscript))
    }

    fn snapshot(label: Option<&str>) -> SessionSnapshot {
        let snapshot = SessionSnapshot::new(ChatSession::new(SessionId::new(7), "s"));
        match label {
            Some(label) => snapshot.with_ai_model(AiModel {
                id: AiModelId::new(1),
                label: label.to_string(),
                description: None,
                created_at: SystemTime::now(),
                updated_at: SystemTime::now(),
            }),
            None => snapshot,
        }
    }

    #[test]
    fn sentinel_match_is_exact() {
        assert_eq!(BackendRoute::from_model_label("ClaudeCode"), BackendRoute::Transcript);
        assert!(matches!(
            BackendRoute::from_model_label("claudecode"),
            BackendRoute::Chat { .. }
        ));
        assert!(matches!(
            BackendRoute::from_model_label(" ClaudeCode"),
            BackendRoute::Chat { .. }
        ));
        assert_eq!(BackendRoute::Transcript.backend_id(), BackendId::ClaudeCli);
    }

    #[test]
    fn route_requires_a_model_with_a_label() {
        let missing = router().route(&snapshot(None)).expect_err("no model should fail");
        assert_eq!(missing.kind, ChatErrorKind::BusinessRule);

        let blank = router()
            .route(&snapshot(Some("  ")))
            .expect_err("blank label should fail");
        assert_eq!(blank.kind, ChatErrorKind::BusinessRule);

        let route = router()
            .route(&snapshot(Some("gpt-4o")))
            .expect("labelled model should route");
        assert_eq!(
            route,
            BackendRoute::Chat {
                model: "gpt-4o".to_string()
            }
        );
    }

    #[tokio::test]
    async fn open_dispatches_to_matching_backend() {
        let router = router();

        let mut chat = router
            .open(FormattedConversation::Structured {
                model: "gpt-4o".to_string(),
                messages: vec![Message::system("p"), Message::user("hi")],
            })
            .await
            .expect("chat stream should open");
        assert_eq!(chat.next().await, Some(Ok("chat:gpt-4o:2".to_string())));

        let mut cli = router
            .open(FormattedConversation::Transcript {
                system_prompt: "p".to_string(),
                transcript: "User: hi".to_string(),
            })
            .await
            .expect("transcript stream should open");
        assert_eq!(cli.next().await, Some(Ok("cli:p:User: hi".to_string())));
    }
}
