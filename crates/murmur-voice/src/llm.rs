//! Language model seam and an OpenAI-compatible streaming adapter.

use crate::error::VoiceError;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Buffered tokens between the HTTP reader task and the agent.
const TOKEN_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on connecting and receiving response headers.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Reply tokens in arrival order. The channel closes when the reply ends;
/// an `Err` item ends the reply early.
pub type TokenStream = mpsc::Receiver<Result<String, VoiceError>>;

/// A chat model that streams its reply.
///
/// `stream_reply` returns as soon as the request is accepted; tokens are
/// observed through the returned channel.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn stream_reply(&self, messages: &[ChatMessage]) -> Result<TokenStream, VoiceError>;
}

/// One parsed server-sent-events line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    Token(String),
    Done,
    Skip,
}

/// Parses a line of an OpenAI chat-completions event stream.
pub fn parse_sse_line(line: &str) -> Result<SseLine, VoiceError> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        // Blank keep-alives, comments and `event:`/`id:` fields.
        return Ok(SseLine::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let value: Value = serde_json::from_str(data)?;
    if let Some(error) = value.get("error") {
        return Err(VoiceError::Llm(format!("stream error: {}", error)));
    }

    match value["choices"][0]["delta"]["content"].as_str() {
        Some(token) if !token.is_empty() => Ok(SseLine::Token(token.to_string())),
        _ => Ok(SseLine::Skip),
    }
}

/// Reassembles event-stream lines from arbitrary body chunks.
///
/// Each call yields the items to forward, in order. Nothing is yielded after
/// `[DONE]` or after the first error.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    closed: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the stream has ended, cleanly or with an error.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Parses every complete line in the buffered body.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<String, VoiceError>> {
        let mut items = Vec::new();
        if self.closed {
            return items;
        }
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.accept(&line, &mut items);
            if self.closed {
                self.pending.clear();
                break;
            }
        }
        items
    }

    /// Handles the end of the body.
    ///
    /// A final line without a trailing newline is still parsed. A body that
    /// never sent `[DONE]` ends with an error item.
    pub fn finish(&mut self) -> Vec<Result<String, VoiceError>> {
        let mut items = Vec::new();
        if self.closed {
            return items;
        }
        let rest = std::mem::take(&mut self.pending);
        self.accept(&rest, &mut items);
        if !self.closed {
            self.closed = true;
            items.push(Err(VoiceError::Llm("stream ended early".into())));
        }
        items
    }

    fn accept(&mut self, line: &[u8], items: &mut Vec<Result<String, VoiceError>>) {
        match parse_sse_line(&String::from_utf8_lossy(line)) {
            Ok(SseLine::Token(token)) => items.push(Ok(token)),
            Ok(SseLine::Done) => self.closed = true,
            Ok(SseLine::Skip) => {}
            Err(e) => {
                self.closed = true;
                items.push(Err(e));
            }
        }
    }
}

/// Streaming chat completions against any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiChat {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Request body; the reply is constrained to a JSON object.
    pub fn request_body(&self, messages: &[ChatMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
            "response_format": { "type": "json_object" },
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    async fn stream_reply(&self, messages: &[ChatMessage]) -> Result<TokenStream, VoiceError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = tokio::time::timeout(
            CONNECT_TIMEOUT,
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&self.request_body(messages))
                .send(),
        )
        .await
        .map_err(|_| {
            VoiceError::Llm(format!(
                "no response after {} seconds",
                CONNECT_TIMEOUT.as_secs()
            ))
        })??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Llm(format!("{} returned {}: {}", url, status, body)));
        }

        let (tx, rx) = mpsc::channel(TOKEN_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::new();

            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(VoiceError::Http(e))).await;
                        return;
                    }
                };
                if !forward(&tx, decoder.feed(&chunk)).await || decoder.is_closed() {
                    return;
                }
            }
            forward(&tx, decoder.finish()).await;
        });

        Ok(rx)
    }
}

/// Sends decoded items on; false once the receiver is gone.
async fn forward(
    tx: &mpsc::Sender<Result<String, VoiceError>>,
    items: Vec<Result<String, VoiceError>>,
) -> bool {
    for item in items {
        if tx.send(item).await.is_err() {
            tracing::debug!("token receiver dropped, abandoning stream");
            return false;
        }
    }
    true
}
