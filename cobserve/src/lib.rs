//! Production-friendly observability hooks for chat generation and message lifecycle events.
//!
//! ```rust
//! use cobserve::{
//!     CombinedChatHooks, MetricsObservabilityHooks, SafeChatHooks, TracingObservabilityHooks,
//! };
//!
//! let _hooks = SafeChatHooks::new(CombinedChatHooks::new(
//!     TracingObservabilityHooks,
//!     MetricsObservabilityHooks,
//! ));
//! ```

mod metrics_hooks;
mod safe_hooks;
mod tracing_hooks;

pub use metrics_hooks::MetricsObservabilityHooks;
pub use safe_hooks::{CombinedChatHooks, SafeChatHooks};
pub use tracing_hooks::TracingObservabilityHooks;

pub mod prelude {
    pub use crate::{
        CombinedChatHooks, MetricsObservabilityHooks, SafeChatHooks, TracingObservabilityHooks,
    };
}

#[cfg(test)]
mod tests;
