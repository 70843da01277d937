//! Common `cprovider` imports for downstream crates.

pub use crate::{
    BackendId, BoxedChunkStream, ChatBackend, ChunkStream, Message, ProviderError,
    ProviderErrorKind, ProviderFuture, Role, TranscriptBackend, VecChunkStream,
};
pub use ccommon::BoxFuture;
