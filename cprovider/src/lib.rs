//! Backend contracts and clients for streaming assistant responses.
//!
//! Two backend families exist: [`ChatBackend`] receives structured role/content
//! messages, [`TranscriptBackend`] receives a system prompt plus a flattened
//! transcript. Both return a lazy [`BoxedChunkStream`] of text fragments.
//!
//! ```rust
//! use cprovider::{BackendId, ChatBackend, Message, ProviderError, ProviderFuture};
//! use cprovider::{BoxedChunkStream, VecChunkStream};
//!
//! struct Canned;
//!
//! impl ChatBackend for Canned {
//!     fn id(&self) -> BackendId {
//!         BackendId::OpenAiChat
//!     }
//!
//!     fn stream<'a>(
//!         &'a self,
//!         _model: String,
//!         _messages: Vec<Message>,
//!     ) -> ProviderFuture<'a, Result<BoxedChunkStream<'a>, ProviderError>> {
//!         Box::pin(async {
//!             Ok(Box::pin(VecChunkStream::from_chunks(["hi"])) as BoxedChunkStream<'a>)
//!         })
//!     }
//! }
//! ```

pub mod adapters;
mod error;
mod model;
pub mod prelude;
mod provider;
mod stream;

pub use error::{ProviderError, ProviderErrorKind};
pub use model::{BackendId, Message, Role};
pub use provider::{ChatBackend, ProviderFuture, TranscriptBackend};
pub use stream::{BoxedChunkStream, ChunkStream, VecChunkStream};

#[cfg(feature = "backend-claude-cli")]
pub use adapters::claude_cli::{ClaudeCliBackend, ClaudeCliConfig};
#[cfg(feature = "backend-openai")]
pub use adapters::openai::{OpenAiChatBackend, OpenAiChatConfig};

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use crate::{Message, ProviderError, ProviderErrorKind, Role, VecChunkStream};

    #[test]
    fn role_wire_names_match_chat_completions_roles() {
        assert_eq!(Role::System.as_str(), "system");
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::assistant("a").content, "a");
    }

    #[test]
    fn provider_error_display_includes_kind_and_message() {
        let error = ProviderError::process("exit status 2");
        assert_eq!(error.kind, ProviderErrorKind::Process);
        assert_eq!(error.to_string(), "Process: exit status 2");
    }

    #[tokio::test]
    async fn vec_chunk_stream_yields_items_in_order_then_ends() {
        let mut stream = VecChunkStream::new(vec![
            Ok("a".to_string()),
            Err(ProviderError::transport("reset")),
        ]);

        assert_eq!(stream.next().await, Some(Ok("a".to_string())));
        assert!(matches!(stream.next().await, Some(Err(_))));
        assert_eq!(stream.next().await, None);
    }
}
