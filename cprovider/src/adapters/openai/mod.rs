mod backend;
mod serde_api;
mod sse;

pub use backend::{DEFAULT_OPENAI_BASE_URL, OpenAiChatBackend, OpenAiChatConfig};
