//! Failures raised while opening or draining a backend stream.
//!
//! ```rust
//! use cprovider::{ProviderError, ProviderErrorKind};
//!
//! let err = ProviderError::process("claude exited with status 2");
//! assert_eq!(err.kind, ProviderErrorKind::Process);
//! assert_eq!(err.to_string(), "Process: claude exited with status 2");
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Which stage of a backend call went wrong.
///
/// HTTP statuses map onto the first five kinds; `Transport` covers connection and
/// stream decoding failures; `Process` covers the CLI child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Authentication,
    RateLimited,
    InvalidRequest,
    Timeout,
    Unavailable,
    Transport,
    Process,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Authentication, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transport, message)
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Process, message)
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ProviderError {}
