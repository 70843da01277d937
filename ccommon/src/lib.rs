//! Shared utilities and strongly-typed common values for workspace crates.
//!
//! ```rust
//! use ccommon::{MessageId, SessionId};
//!
//! let session = SessionId::new(7);
//! let message = MessageId::from(42);
//!
//! assert_eq!(session.get(), 7);
//! assert_eq!(message.to_string(), "42");
//! ```

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use ccommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod ids {
    //! Store-assigned identifier newtypes.
    //!
    //! Every id wraps the `i64` row id handed out by the store in insertion order, so
    //! comparing two ids of the same kind also compares their insertion order.
    //!
    //! ```rust
    //! use ccommon::{CharacterId, SessionId};
    //!
    //! let first = SessionId::new(1);
    //! let second = SessionId::new(2);
    //! assert!(first < second);
    //!
    //! let character: CharacterId = 3.into();
    //! assert_eq!(i64::from(character), 3);
    //! ```

    use std::fmt::{Display, Formatter};

    use serde::{Deserialize, Serialize};

    macro_rules! store_id {
        ($(#[$meta:meta])* $name:ident) => {
            $(#[$meta])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(i64);

            impl $name {
                pub const fn new(value: i64) -> Self {
                    Self(value)
                }

                pub const fn get(self) -> i64 {
                    self.0
                }
            }

            impl Display for $name {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl From<i64> for $name {
                fn from(value: i64) -> Self {
                    Self(value)
                }
            }

            impl From<$name> for i64 {
                fn from(value: $name) -> Self {
                    value.0
                }
            }
        };
    }

    store_id!(
        /// Identifies one chat session.
        SessionId
    );
    store_id!(
        /// Identifies one persisted message; doubles as the conversation tie-breaker.
        MessageId
    );
    store_id!(CharacterId);
    store_id!(UserProfileId);
    store_id!(AiModelId);
    store_id!(SystemPromptId);
}

pub use future::BoxFuture;
pub use ids::{AiModelId, CharacterId, MessageId, SessionId, SystemPromptId, UserProfileId};
