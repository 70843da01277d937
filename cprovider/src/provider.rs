use std::future::Future;
use std::pin::Pin;

use crate::{BackendId, BoxedChunkStream, Message, ProviderError};

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Token-streaming chat backend fed with structured role/content messages.
pub trait ChatBackend: Send + Sync {
    fn id(&self) -> BackendId;

    fn stream<'a>(
        &'a self,
        model: String,
        messages: Vec<Message>,
    ) -> ProviderFuture<'a, Result<BoxedChunkStream<'a>, ProviderError>>;
}

/// Line-oriented backend fed with a system prompt and a flattened transcript.
pub trait TranscriptBackend: Send + Sync {
    fn id(&self) -> BackendId;

    fn stream<'a>(
        &'a self,
        system_prompt: String,
        transcript: String,
    ) -> ProviderFuture<'a, Result<BoxedChunkStream<'a>, ProviderError>>;
}
