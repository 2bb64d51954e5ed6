//! Remote completion client.
//!
//! Sends the conversation transcript to the chat-completion endpoint and
//! normalizes both response modes to one [`ReplyStream`] contract:
//! streaming mode yields zero or more [`ReplyEvent::Fragment`]s followed
//! by one [`ReplyEvent::Completed`] carrying the concatenated reply;
//! single-shot mode yields exactly one `Completed`.
//!
//! Cancellation is the caller's concern: racing the stream against a
//! cancellation token and dropping it aborts the underlying request.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::debug;

use crate::config::{RelayConfig, ResponseMode, WebSearchConfig};
use crate::error::{AssistantError, Result};
use crate::relay::sse::DataLineParser;
use crate::transcript::Message;

/// One step of a reply being retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEvent {
    /// An incremental piece of assistant text (streaming mode only).
    Fragment(String),
    /// The full reply text. Always the final event of a successful stream.
    Completed(String),
}

/// The normalized reply stream shared by both response modes.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<ReplyEvent>> + Send>>;

/// Client for the remote chat-completion endpoint.
#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    config: RelayConfig,
    api_key: String,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("api_url", &self.config.api_url)
            .field("model", &self.config.model)
            .field("mode", &self.config.mode)
            .finish()
    }
}

impl CompletionClient {
    /// Create a client, resolving the bearer credential eagerly.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Config`] when no credential is available.
    pub fn new(config: RelayConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        Ok(Self {
            http: reqwest::Client::new(),
            config,
            api_key,
        })
    }

    /// Submit the transcript and return the normalized reply stream.
    ///
    /// # Errors
    ///
    /// - [`AssistantError::Transport`] for connection-level failures.
    /// - [`AssistantError::Network`] for non-success HTTP statuses.
    /// - [`AssistantError::Protocol`] for unparseable response bodies.
    /// - [`AssistantError::EmptyReply`] when single-shot mode extracts no
    ///   usable content.
    pub async fn fetch_reply(&self, transcript: &[Message]) -> Result<ReplyStream> {
        let body = build_request_body(&self.config, transcript);
        debug!(
            url = %self.config.api_url,
            mode = ?self.config.mode,
            messages = transcript.len(),
            "submitting completion request"
        );

        let response = self
            .http
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Transport(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssistantError::Network {
                status: status.as_u16(),
            });
        }

        match self.config.mode {
            ResponseMode::SingleShot => {
                let raw = response.text().await.map_err(|e| {
                    AssistantError::Transport(format!("failed to read response body: {e}"))
                })?;
                let text = extract_single_shot_reply(&raw)?;
                Ok(Box::pin(futures_util::stream::once(async move {
                    Ok::<_, AssistantError>(ReplyEvent::Completed(text))
                })))
            }
            ResponseMode::Streaming => Ok(Box::pin(fragment_stream(response.bytes_stream()))),
        }
    }
}

// ── Request building ──────────────────────────────────────────

/// Build the JSON request body for the configured response mode.
pub fn build_request_body(config: &RelayConfig, transcript: &[Message]) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": config.model,
        "messages": transcript,
    });

    if let Some(obj) = body.as_object_mut() {
        match config.mode {
            ResponseMode::Streaming => {
                obj.insert("stream".into(), serde_json::json!(true));
            }
            ResponseMode::SingleShot => {
                if let Some(search) = &config.web_search {
                    obj.insert("web_search_options".into(), web_search_to_json(search));
                }
            }
        }
    }

    body
}

fn web_search_to_json(search: &WebSearchConfig) -> serde_json::Value {
    let mut approximate = serde_json::json!({ "country": search.country });
    if let Some(obj) = approximate.as_object_mut() {
        if let Some(city) = &search.city {
            obj.insert("city".into(), serde_json::json!(city));
        }
        if let Some(region) = &search.region {
            obj.insert("region".into(), serde_json::json!(region));
        }
    }
    serde_json::json!({
        "search_context_size": search.search_context_size,
        "user_location": { "approximate": approximate },
    })
}

// ── Response parsing ──────────────────────────────────────────

/// Extract the trimmed reply from a single-shot response body.
///
/// The reply lives at `choices[0].message.content`. A parsed body whose
/// content is absent or blank is the distinct [`AssistantError::EmptyReply`]
/// outcome, not a protocol violation.
fn extract_single_shot_reply(raw: &str) -> Result<String> {
    let payload: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| AssistantError::Protocol(format!("malformed response body: {e}")))?;
    let content = payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default();
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AssistantError::EmptyReply);
    }
    Ok(trimmed.to_owned())
}

/// Extract the incremental text from one streaming data payload.
///
/// A chunk that never populates `choices[0].delta.content` is an empty
/// addition, not an error; malformed JSON is a protocol violation.
fn extract_delta(data: &str) -> Result<String> {
    let payload: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| AssistantError::Protocol(format!("malformed stream payload: {e}")))?;
    Ok(payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_owned())
}

/// Internal state for the fragment stream.
struct FragmentStreamState {
    bytes: Pin<Box<dyn Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send>>,
    parser: DataLineParser,
    full: String,
    pending: VecDeque<Result<ReplyEvent>>,
    finished: bool,
}

impl FragmentStreamState {
    /// Queue the events for one parsed `data:` line; returns whether the
    /// stream is complete.
    fn ingest_line(&mut self, line: &crate::relay::sse::DataLine) -> bool {
        if line.is_done() {
            self.pending
                .push_back(Ok(ReplyEvent::Completed(std::mem::take(&mut self.full))));
            return true;
        }
        match extract_delta(&line.payload) {
            Ok(delta) => {
                if !delta.is_empty() {
                    self.full.push_str(&delta);
                    self.pending.push_back(Ok(ReplyEvent::Fragment(delta)));
                }
                false
            }
            Err(err) => {
                self.pending.push_back(Err(err));
                true
            }
        }
    }
}

/// Convert the response byte stream into a [`ReplyEvent`] stream.
fn fragment_stream(
    byte_stream: impl Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = Result<ReplyEvent>> + Send {
    futures_util::stream::unfold(
        FragmentStreamState {
            bytes: Box::pin(byte_stream),
            parser: DataLineParser::new(),
            full: String::new(),
            pending: VecDeque::new(),
            finished: false,
        },
        |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.finished {
                    return None;
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        for line in state.parser.push(&chunk) {
                            if state.ingest_line(&line) {
                                state.finished = true;
                                break;
                            }
                        }
                    }
                    Some(Err(err)) => {
                        state.pending.push_back(Err(AssistantError::Transport(format!(
                            "stream read failed: {err}"
                        ))));
                        state.finished = true;
                    }
                    None => {
                        // Endpoint closed without [DONE]: flush the parser
                        // and treat end-of-body as completion.
                        if let Some(line) = state.parser.flush() {
                            state.finished = state.ingest_line(&line);
                        }
                        if !state.finished {
                            state.pending.push_back(Ok(ReplyEvent::Completed(
                                std::mem::take(&mut state.full),
                            )));
                            state.finished = true;
                        }
                    }
                }
            }
        },
    )
}
