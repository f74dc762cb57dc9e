//! Streaming chat completion capability
//!
//! A [`CompletionProvider`] opens one [`RemoteChat`] per session. The chat
//! keeps the provider-side conversational context, and every `send` yields a
//! [`FragmentStream`] that borrows the chat mutably until it is dropped, so a
//! second `send` cannot start while a reply is still being read.

pub mod aggregate;
pub mod openai;
mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::Result;

pub use aggregate::{aggregate, aggregate_with};
pub use openai::OpenAiCompletions;

/// Single-pass, forward-only sequence of reply fragments
///
/// Exhaustion is the only end-of-reply marker. An `Err` item ends the stream.
pub type FragmentStream<'a> = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>>;

/// Session-scoped conversational context held by the completion provider
#[async_trait]
pub trait RemoteChat: Send {
    /// Forward an utterance and return its lazily produced reply
    ///
    /// The stream must be drained before the next `send`; the borrow on
    /// `self` enforces that.
    ///
    /// # Errors
    ///
    /// Returns `Error::CompletionUnavailable` if the request fails outright
    async fn send<'a>(&'a mut self, utterance: &str) -> Result<FragmentStream<'a>>;
}

/// Factory for remote chats
pub trait CompletionProvider: Send + Sync {
    /// Open a chat with empty prior context
    fn start_chat(&self) -> Box<dyn RemoteChat>;
}
