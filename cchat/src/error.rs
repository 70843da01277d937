//! Chat-layer errors and classification.
//!
//! ```rust
//! use cchat::{ChatError, ChatErrorKind};
//!
//! let err = ChatError::business_rule("session has no AI model configured");
//! assert_eq!(err.kind, ChatErrorKind::BusinessRule);
//! assert!(err.is_user_error());
//! assert!(!ChatError::database("disk full").is_user_error());
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    /// Bad input shape or content; nothing was changed.
    Validation,
    /// A referenced entity does not exist.
    NotFound,
    /// The operation violates a domain constraint.
    BusinessRule,
    /// The storage layer failed; the in-flight transaction was rolled back.
    Database,
    /// A backend failed while producing a response.
    Stream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::NotFound, message)
    }

    pub fn business_rule(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::BusinessRule, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Database, message)
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Stream, message)
    }

    pub fn is_user_error(&self) -> bool {
        matches!(
            self.kind,
            ChatErrorKind::Validation | ChatErrorKind::NotFound | ChatErrorKind::BusinessRule
        )
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ChatError {}

impl From<cprovider::ProviderError> for ChatError {
    fn from(value: cprovider::ProviderError) -> Self {
        ChatError::stream(value.to_string())
    }
}
