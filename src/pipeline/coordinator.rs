//! Turn coordinator: the single owner of conversational state.
//!
//! One coordinator task owns the transcript and the active turn, and
//! reacts to [`InputEvent`]s from the capture collaborator and text
//! frontends. The contract it enforces:
//!
//! - at most one response turn is active at any instant;
//! - new user input pre-empts everything: the prior turn's network
//!   request is cancelled and speech is silenced before the new user
//!   message is appended;
//! - the assistant message is appended only once the full reply is
//!   available, never incrementally;
//! - a cancelled turn renders nothing; every other failure renders
//!   exactly one generic status line and mutates nothing.
//!
//! The network drive of a turn runs in a spawned task subordinate to the
//! turn's cancellation token; it communicates exclusively through the
//! turn-event channel, so a retired turn's late events have nowhere to go.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{AssistantConfig, ResponseMode};
use crate::error::AssistantError;
use crate::pipeline::messages::{InputEvent, TurnEvent, UiEvent};
use crate::relay::{CompletionClient, ReplyEvent};
use crate::speech::{SpeechOutput, Synthesizer};
use crate::transcript::{ContextKind, Message, Transcript};

const TURN_EVENT_CHANNEL_SIZE: usize = 16;
const UI_CHANNEL_SIZE: usize = 64;

const STATUS_LISTENING: &str = "Listening…";
const STATUS_THINKING: &str = "Thinking…";
const STATUS_ERROR: &str = "Something went wrong reaching the assistant.";
const STATUS_NO_ANSWER: &str = "The assistant had no answer to that.";

/// The in-flight request/response cycle.
struct ActiveTurn {
    id: Uuid,
    token: CancellationToken,
    events_rx: mpsc::Receiver<TurnEvent>,
    /// Cumulative reply text, also shown as the live status.
    reply: String,
    /// Fragments not yet handed to the speech controller.
    sentence: SentenceBuffer,
}

/// Orchestrates transcript, relay client, and speech output.
pub struct TurnCoordinator {
    config: AssistantConfig,
    client: CompletionClient,
    speech: SpeechOutput,
    transcript: Transcript,
    context: ContextKind,
    transcript_tx: watch::Sender<Vec<Message>>,
    ui_tx: broadcast::Sender<UiEvent>,
    input_tx: mpsc::UnboundedSender<InputEvent>,
    input_rx: Option<mpsc::UnboundedReceiver<InputEvent>>,
    cancel: CancellationToken,
}

impl TurnCoordinator {
    /// Create a coordinator starting in the voice context.
    ///
    /// Must be called from within a Tokio runtime (the speech controller
    /// spawns its playback worker immediately).
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Config`] when the relay credential cannot
    /// be resolved.
    pub fn new(
        config: AssistantConfig,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> crate::error::Result<Self> {
        let (ui_tx, _) = broadcast::channel(UI_CHANNEL_SIZE);
        let client = CompletionClient::new(config.relay.clone())?;
        let speech = SpeechOutput::new(synthesizer, &config.speech, ui_tx.clone());
        let context = ContextKind::Voice;
        let transcript = Transcript::new(config.contexts.system_prompt(context));
        let (transcript_tx, _) = watch::channel(transcript.messages().to_vec());
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            client,
            speech,
            transcript,
            context,
            transcript_tx,
            ui_tx,
            input_tx,
            input_rx: Some(input_rx),
            cancel: CancellationToken::new(),
        })
    }

    /// Sender for input events; clone freely for collaborators.
    pub fn input_sender(&self) -> mpsc::UnboundedSender<InputEvent> {
        self.input_tx.clone()
    }

    /// Subscribe to render-sink notifications.
    pub fn ui_events(&self) -> broadcast::Receiver<UiEvent> {
        self.ui_tx.subscribe()
    }

    /// A read-only view of the transcript, updated on every mutation.
    pub fn transcript_watch(&self) -> watch::Receiver<Vec<Message>> {
        self.transcript_tx.subscribe()
    }

    /// Token that shuts the coordinator down when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until shutdown or until every input sender is dropped.
    pub async fn run(mut self) {
        let Some(mut input_rx) = self.input_rx.take() else {
            return;
        };
        let cancel = self.cancel.clone();
        let mut active: Option<ActiveTurn> = None;

        info!(mode = ?self.config.relay.mode, "turn coordinator started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = input_rx.recv() => match event {
                    Some(event) => self.handle_input(event, &mut active),
                    None => break,
                },
                turn_event = next_turn_event(&mut active) => match turn_event {
                    Some(event) => self.handle_turn_event(event, &mut active),
                    None => {
                        warn!("turn task ended without a final event");
                        active = None;
                    }
                },
            }
        }

        self.interrupt_output(&mut active);
        info!("turn coordinator stopped");
    }

    fn handle_input(&mut self, event: InputEvent, active: &mut Option<ActiveTurn>) {
        match event {
            InputEvent::CaptureStarted => {
                self.interrupt_output(active);
                self.publish(UiEvent::Listening(true));
                self.publish(UiEvent::Status(STATUS_LISTENING.to_owned()));
            }
            InputEvent::CaptureEnded => {
                self.publish(UiEvent::Listening(false));
            }
            InputEvent::Utterance(text) | InputEvent::TypedMessage(text) => {
                if text.trim().is_empty() {
                    return;
                }
                self.start_turn(text, active);
            }
            InputEvent::ContextSwitch(kind) => {
                self.switch_context(kind, active);
            }
        }
    }

    /// Start a new turn, retiring the previous one entirely first.
    fn start_turn(&mut self, user_text: String, active: &mut Option<ActiveTurn>) {
        self.interrupt_output(active);

        self.append_message(Message::user(user_text));
        self.publish(UiEvent::Status(STATUS_THINKING.to_owned()));

        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(TURN_EVENT_CHANNEL_SIZE);
        let snapshot = self.transcript.messages().to_vec();
        let client = self.client.clone();
        let task_token = token.clone();
        tokio::spawn(async move {
            drive_turn(client, snapshot, events_tx, task_token).await;
        });

        debug!(%id, context = %self.context, "turn started");
        *active = Some(ActiveTurn {
            id,
            token,
            events_rx,
            reply: String::new(),
            sentence: SentenceBuffer::default(),
        });
    }

    fn handle_turn_event(&mut self, event: TurnEvent, active: &mut Option<ActiveTurn>) {
        match event {
            TurnEvent::Fragment(delta) => {
                let (status, flushed) = match active.as_mut() {
                    Some(turn) => {
                        turn.reply.push_str(&delta);
                        let flushed = turn.sentence.push(&delta);
                        (turn.reply.clone(), flushed)
                    }
                    None => return,
                };
                self.publish(UiEvent::Status(status));
                if let Some(sentence) = flushed {
                    self.speech.speak(&sentence);
                }
            }
            TurnEvent::Completed(full) => {
                let Some(mut turn) = active.take() else { return };
                match self.config.relay.mode {
                    ResponseMode::Streaming => {
                        if let Some(rest) = turn.sentence.take_rest() {
                            self.speech.speak(&rest);
                        }
                    }
                    ResponseMode::SingleShot => {
                        self.speech.speak(&full);
                    }
                }
                self.append_message(Message::assistant(full.clone()));
                self.publish(UiEvent::Status(full));
                debug!(id = %turn.id, "turn completed");
            }
            TurnEvent::Failed(err) => {
                let Some(turn) = active.take() else { return };
                if err.is_cancellation() {
                    debug!(id = %turn.id, "turn cancelled");
                    return;
                }
                warn!(id = %turn.id, code = err.code(), error = %err, "turn failed");
                let status = if matches!(err, AssistantError::EmptyReply) {
                    STATUS_NO_ANSWER
                } else {
                    STATUS_ERROR
                };
                self.publish(UiEvent::Status(status.to_owned()));
            }
        }
    }

    /// Switch conversational context, discarding the history.
    ///
    /// Also cancels the in-flight turn: a reply fetched under the old
    /// context must never attach to the new one.
    fn switch_context(&mut self, kind: ContextKind, active: &mut Option<ActiveTurn>) {
        self.interrupt_output(active);
        self.context = kind;
        self.transcript
            .reset(self.config.contexts.system_prompt(kind).to_owned());
        self.publish_transcript();
        info!(context = %kind, "conversation context switched");
    }

    /// Retire the active turn and silence speech. Must complete before any
    /// new transcript mutation.
    fn interrupt_output(&mut self, active: &mut Option<ActiveTurn>) {
        if let Some(turn) = active.take() {
            debug!(id = %turn.id, "cancelling in-flight turn");
            turn.token.cancel();
        }
        self.speech.cancel();
    }

    fn append_message(&mut self, message: Message) {
        self.publish(UiEvent::MessageAppended {
            role: message.role,
            text: message.content.clone(),
        });
        self.transcript.append(message);
        self.publish_transcript();
    }

    fn publish_transcript(&self) {
        let _ = self
            .transcript_tx
            .send_replace(self.transcript.messages().to_vec());
    }

    fn publish(&self, event: UiEvent) {
        let _ = self.ui_tx.send(event);
    }
}

/// Resolve to the active turn's next event, or never when idle.
async fn next_turn_event(active: &mut Option<ActiveTurn>) -> Option<TurnEvent> {
    match active {
        Some(turn) => turn.events_rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Drive one turn's network exchange, forwarding events to the
/// coordinator until completion, failure, or cancellation.
///
/// Cancellation drops the reply stream, which aborts the underlying
/// request; no event is sent for a cancelled turn.
async fn drive_turn(
    client: CompletionClient,
    transcript: Vec<Message>,
    events_tx: mpsc::Sender<TurnEvent>,
    token: CancellationToken,
) {
    let exchange = async {
        let mut stream = client.fetch_reply(&transcript).await?;
        loop {
            let Some(item) = stream.next().await else {
                return Err(AssistantError::Protocol(
                    "reply stream ended without completion".into(),
                ));
            };
            match item? {
                ReplyEvent::Fragment(delta) => {
                    if events_tx.send(TurnEvent::Fragment(delta)).await.is_err() {
                        return Ok(None);
                    }
                }
                ReplyEvent::Completed(full) => return Ok(Some(full)),
            }
        }
    };

    tokio::select! {
        () = token.cancelled() => {
            debug!("turn network task cancelled");
        }
        result = exchange => match result {
            Ok(Some(full)) => {
                let _ = events_tx.send(TurnEvent::Completed(full)).await;
            }
            Ok(None) => {}
            Err(err) => {
                let _ = events_tx.send(TurnEvent::Failed(err)).await;
            }
        },
    }
}

/// Accumulates streamed fragments until a sentence-terminal character
/// arrives, trading a little latency for natural sentence-by-sentence
/// speech.
#[derive(Debug, Default)]
struct SentenceBuffer {
    buffer: String,
}

impl SentenceBuffer {
    /// Append a fragment; returns the buffered text when the fragment
    /// carries a sentence boundary.
    fn push(&mut self, fragment: &str) -> Option<String> {
        self.buffer.push_str(fragment);
        if fragment.chars().any(is_sentence_terminal) {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }

    /// Drain whatever is left at end of stream, if it says anything.
    fn take_rest(&mut self) -> Option<String> {
        if self.buffer.trim().is_empty() {
            self.buffer.clear();
            return None;
        }
        Some(std::mem::take(&mut self.buffer))
    }
}

fn is_sentence_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '\n')
}
