//! OpenAI-compatible streaming chat completions
//!
//! Works against any `/chat/completions` endpoint that speaks the `OpenAI`
//! server-sent events format (`OpenAI`, `OpenRouter`, local gateways).

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::sse::{SseData, SseLineParser};
use super::{CompletionProvider, FragmentStream, RemoteChat};
use crate::{Error, Result};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: &str) -> Self {
        Self {
            role: "system",
            content: content.to_string(),
        }
    }

    fn user(content: &str) -> Self {
        Self {
            role: "user",
            content: content.to_string(),
        }
    }

    fn assistant(content: String) -> Self {
        Self {
            role: "assistant",
            content,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

struct Endpoint {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    system_prompt: Option<String>,
}

/// Completion provider backed by an `OpenAI`-compatible API
pub struct OpenAiCompletions {
    endpoint: Arc<Endpoint>,
}

impl OpenAiCompletions {
    /// Create a provider
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        model: impl Into<String>,
        system_prompt: Option<String>,
    ) -> Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(Error::StartupConfigMissing(
                "completion API key is empty".to_string(),
            ));
        }

        let endpoint = Endpoint {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            system_prompt: system_prompt.filter(|p| !p.trim().is_empty()),
        };

        tracing::debug!(
            base_url = %endpoint.base_url,
            model = %endpoint.model,
            "completion provider configured"
        );

        Ok(Self {
            endpoint: Arc::new(endpoint),
        })
    }
}

impl CompletionProvider for OpenAiCompletions {
    fn start_chat(&self) -> Box<dyn RemoteChat> {
        let messages = self
            .endpoint
            .system_prompt
            .as_deref()
            .map(|prompt| vec![ChatMessage::system(prompt)])
            .unwrap_or_default();

        Box::new(OpenAiChat {
            endpoint: Arc::clone(&self.endpoint),
            messages,
        })
    }
}

/// One conversation's context on the provider
///
/// The API itself is stateless, so the context travels with every request.
struct OpenAiChat {
    endpoint: Arc<Endpoint>,
    messages: Vec<ChatMessage>,
}

#[async_trait]
impl RemoteChat for OpenAiChat {
    async fn send<'a>(&'a mut self, utterance: &str) -> Result<FragmentStream<'a>> {
        let url = format!("{}/chat/completions", self.endpoint.base_url);
        self.messages.push(ChatMessage::user(utterance));

        tracing::debug!(
            context_len = self.messages.len(),
            utterance_len = utterance.len(),
            "sending completion request"
        );

        let request = ChatRequest {
            model: &self.endpoint.model,
            messages: &self.messages,
            stream: true,
        };

        let sent = self
            .endpoint
            .client
            .post(&url)
            .bearer_auth(self.endpoint.api_key.expose_secret())
            .json(&request)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                self.messages.pop();
                tracing::error!(error = %e, "completion request failed");
                return Err(Error::CompletionUnavailable(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            self.messages.pop();
            tracing::error!(status = %status, body = %body, "completion API error");
            return Err(Error::CompletionUnavailable(format!(
                "completion API error {status}: {body}"
            )));
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()));

        let state = ReplyState {
            bytes: Box::pin(bytes),
            parser: SseLineParser::new(),
            pending: VecDeque::new(),
            reply: String::new(),
            context: &mut self.messages,
            finished: false,
        };

        Ok(Box::pin(futures::stream::unfold(state, |state| {
            next_fragment(state)
        })))
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Vec<u8>>> + Send>>;

/// Decoding state for one streamed reply
struct ReplyState<'a> {
    bytes: ByteStream,
    parser: SseLineParser,
    pending: VecDeque<String>,
    reply: String,
    context: &'a mut Vec<ChatMessage>,
    finished: bool,
}

impl ReplyState<'_> {
    fn absorb(&mut self, events: Vec<SseData>) -> Result<()> {
        for event in events {
            if self.finished {
                break;
            }

            match event {
                SseData::Done => self.complete(),
                SseData::Payload(json) => {
                    let payload: ChunkPayload = match serde_json::from_str(&json) {
                        Ok(payload) => payload,
                        Err(e) => {
                            self.abort();
                            return Err(Error::CompletionUnavailable(format!(
                                "malformed completion chunk: {e}"
                            )));
                        }
                    };

                    if let Some(error) = payload.error {
                        self.abort();
                        return Err(Error::CompletionUnavailable(error.message));
                    }

                    let text = payload
                        .choices
                        .into_iter()
                        .filter_map(|c| c.delta.content)
                        .collect::<String>();

                    if !text.is_empty() {
                        self.reply.push_str(&text);
                        self.pending.push_back(text);
                    }
                }
            }
        }
        Ok(())
    }

    /// Record the full reply in the chat context
    fn complete(&mut self) {
        if !self.finished {
            self.context
                .push(ChatMessage::assistant(std::mem::take(&mut self.reply)));
            self.finished = true;
            tracing::debug!(context_len = self.context.len(), "reply stream complete");
        }
    }

    /// Withdraw the user message whose reply failed
    fn abort(&mut self) {
        if !self.finished {
            self.context.pop();
            self.pending.clear();
            self.finished = true;
        }
    }
}

impl Drop for ReplyState<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                received = self.reply.len(),
                "reply stream dropped before it was drained"
            );
            self.complete();
        }
    }
}

async fn next_fragment(mut state: ReplyState<'_>) -> Option<(Result<String>, ReplyState<'_>)> {
    loop {
        if let Some(fragment) = state.pending.pop_front() {
            return Some((Ok(fragment), state));
        }
        if state.finished {
            return None;
        }

        match state.bytes.next().await {
            Some(Ok(chunk)) => {
                let events = state.parser.push(&chunk);
                if let Err(e) = state.absorb(events) {
                    return Some((Err(e), state));
                }
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "completion stream interrupted");
                state.abort();
                return Some((Err(Error::CompletionUnavailable(e.to_string())), state));
            }
            None => {
                let tail = state.parser.flush().into_iter().collect();
                if let Err(e) = state.absorb(tail) {
                    return Some((Err(e), state));
                }
                state.complete();
            }
        }
    }
}
