//! Streaming output contracts and in-memory stream utilities.
//!
//! ```rust
//! use cprovider::{BoxedChunkStream, VecChunkStream};
//!
//! let stream = VecChunkStream::from_chunks(["hello", " world"]);
//! let _boxed: BoxedChunkStream<'static> = Box::pin(stream);
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::ProviderError;

/// Backend output stream contract.
///
/// Invariants for consumers:
/// - Chunks are emitted in the order the backend produced them.
/// - An `Err` item is terminal; consumers stop polling after it.
/// - Once the stream yields `None`, it must not yield additional items.
/// - The stream cannot be restarted; a new call starts a new generation.
pub trait ChunkStream: Stream<Item = Result<String, ProviderError>> + Send {}

impl<T> ChunkStream for T where T: Stream<Item = Result<String, ProviderError>> + Send {}

pub type BoxedChunkStream<'a> = Pin<Box<dyn ChunkStream + 'a>>;

#[derive(Debug)]
pub struct VecChunkStream {
    chunks: VecDeque<Result<String, ProviderError>>,
}

impl VecChunkStream {
    pub fn new(chunks: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            chunks: chunks.into(),
        }
    }

    pub fn from_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(chunks.into_iter().map(|chunk| Ok(chunk.into())).collect())
    }
}

impl Stream for VecChunkStream {
    type Item = Result<String, ProviderError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<String, ProviderError>>> {
        Poll::Ready(self.chunks.pop_front())
    }
}
