//! Conversation assembly and streamed response generation for character chat sessions.
//!
//! A generation persists the user's message, assembles the session's system prompt,
//! formats the history for the backend selected by the model label, relays backend
//! chunks as [`ChatEvent`]s, and persists the final (or interrupted) reply.

mod entities;
mod error;
mod format;
mod hooks;
mod messages;
mod prompt;
mod router;
mod service;
mod store;
mod types;

pub mod prelude {
    pub use crate::{
        BackendRoute, ChatError, ChatErrorKind, ChatEvent, ChatEventStream, ChatRuntimeHooks,
        ChatService, ChatServiceBuilder, ChatSession, ConversationStore, GenerateRequest,
        InMemoryConversationStore, MessagePage, MessageRole, MessageService,
        NoopChatRuntimeHooks, ResponseRouter, SessionSnapshot, StoredMessage,
    };
    pub use ccommon::{MessageId, SessionId};
}

pub use entities::{
    AiModel, Character, ChatSession, MAX_MESSAGE_CHARS, MessageRole, NewMessage, SessionSnapshot,
    StoredMessage, SystemPrompt, UserProfile, validate_message_content,
};
pub use error::{ChatError, ChatErrorKind};
pub use format::{ConversationInput, format_structured, format_transcript};
pub use hooks::{ChatRuntimeHooks, NoopChatRuntimeHooks};
pub use messages::{MessagePage, MessageService};
pub use prompt::{
    AssembledPrompt, NO_CHARACTER_DESCRIPTION, NO_USER_DESCRIPTION, PROMPT_SEGMENT_SEPARATOR,
    assemble_system_prompt,
};
pub use router::{BackendRoute, FormattedConversation, ResponseRouter, TRANSCRIPT_BACKEND_SENTINEL};
pub use service::{ChatService, ChatServiceBuilder, INTERRUPTION_MARKER};
pub use store::{ConversationStore, InMemoryConversationStore};
pub use types::{ChatEvent, ChatEventStream, GenerateRequest, GenerationState};
