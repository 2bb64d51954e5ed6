//! Speech output controller.
//!
//! Owns the utterance queue and the talking indicator; actual audio lives
//! behind the [`Synthesizer`] trait so the core stays testable and
//! platform-independent. Utterances play strictly in order. The talking
//! indicator is raised when an utterance starts and lowered at natural
//! end only when nothing else is queued; [`SpeechOutput::cancel`] is a
//! hard stop that drops the queue, aborts the in-flight utterance, and
//! forces the indicator down unconditionally.

pub mod sanitize;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::config::SpeechConfig;
use crate::pipeline::messages::UiEvent;

pub use sanitize::clean_for_speech;

/// Fixed synthesis parameters for a deployment.
#[derive(Debug, Clone)]
pub struct VoiceSettings {
    /// BCP-47 language tag.
    pub language: String,
    /// Speech rate multiplier.
    pub rate: f32,
}

impl VoiceSettings {
    fn from_config(config: &SpeechConfig) -> Self {
        Self {
            language: config.language.clone(),
            rate: config.rate,
        }
    }
}

/// The seam to an actual speech engine.
///
/// `synthesize` resolves when playback finishes naturally, or early after
/// `cancel`. Engines handle their own failures; a failed utterance is
/// simply a finished one.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Speak `text` aloud and resolve at the end of playback.
    async fn synthesize(&self, text: &str, settings: &VoiceSettings);

    /// Abort any in-flight synthesis immediately.
    fn cancel(&self);
}

/// One queued synthesis job.
struct Utterance {
    text: String,
    epoch: u64,
}

/// Queue-owning controller in front of a [`Synthesizer`].
pub struct SpeechOutput {
    engine: Arc<dyn Synthesizer>,
    queue_tx: mpsc::UnboundedSender<Utterance>,
    /// Bumped by `cancel`; queued utterances from older epochs are dropped.
    epoch: Arc<AtomicU64>,
    /// Utterances accepted but not yet finished or dropped.
    pending: Arc<AtomicUsize>,
    ui_tx: broadcast::Sender<UiEvent>,
    strip_links: bool,
}

impl SpeechOutput {
    /// Create the controller and spawn its playback worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        engine: Arc<dyn Synthesizer>,
        config: &SpeechConfig,
        ui_tx: broadcast::Sender<UiEvent>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel::<Utterance>();
        let epoch = Arc::new(AtomicU64::new(0));
        let pending = Arc::new(AtomicUsize::new(0));

        tokio::spawn(run_playback_worker(
            Arc::clone(&engine),
            VoiceSettings::from_config(config),
            queue_rx,
            Arc::clone(&epoch),
            Arc::clone(&pending),
            ui_tx.clone(),
        ));

        Self {
            engine,
            queue_tx,
            epoch,
            pending,
            ui_tx,
            strip_links: config.strip_links,
        }
    }

    /// Clean `text` and queue it for synthesis.
    ///
    /// A text that is empty or whitespace-only after cleaning is a no-op.
    pub fn speak(&self, text: &str) {
        let clean = sanitize::clean_for_speech(text, self.strip_links);
        if clean.trim().is_empty() {
            return;
        }
        self.pending.fetch_add(1, Ordering::SeqCst);
        let utterance = Utterance {
            text: clean,
            epoch: self.epoch.load(Ordering::SeqCst),
        };
        if self.queue_tx.send(utterance).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Hard stop: drop queued utterances, abort the in-flight one, and
    /// force the talking indicator down. Returns immediately.
    pub fn cancel(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.engine.cancel();
        let _ = self.ui_tx.send(UiEvent::Talking(false));
    }

    /// Utterances accepted but not yet finished or dropped.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// Plays queued utterances in order, skipping those from stale epochs.
async fn run_playback_worker(
    engine: Arc<dyn Synthesizer>,
    settings: VoiceSettings,
    mut queue_rx: mpsc::UnboundedReceiver<Utterance>,
    epoch: Arc<AtomicU64>,
    pending: Arc<AtomicUsize>,
    ui_tx: broadcast::Sender<UiEvent>,
) {
    while let Some(utterance) = queue_rx.recv().await {
        if utterance.epoch != epoch.load(Ordering::SeqCst) {
            pending.fetch_sub(1, Ordering::SeqCst);
            continue;
        }

        let _ = ui_tx.send(UiEvent::Talking(true));
        engine.synthesize(&utterance.text, &settings).await;
        let remaining = pending.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);

        // Lower the indicator at natural end only when nothing else is
        // queued and no cancel intervened (cancel already lowered it).
        if remaining == 0 && utterance.epoch == epoch.load(Ordering::SeqCst) {
            let _ = ui_tx.send(UiEvent::Talking(false));
        }
    }
    debug!("speech playback worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records spoken texts; optionally blocks until cancelled.
    struct RecordingSynthesizer {
        spoken: Mutex<Vec<String>>,
        cancelled: AtomicUsize,
        blocking: bool,
        release: tokio_util::sync::CancellationToken,
    }

    impl RecordingSynthesizer {
        fn new(blocking: bool) -> Arc<Self> {
            Arc::new(Self {
                spoken: Mutex::new(Vec::new()),
                cancelled: AtomicUsize::new(0),
                blocking,
                release: tokio_util::sync::CancellationToken::new(),
            })
        }

        fn spoken(&self) -> Vec<String> {
            self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Synthesizer for RecordingSynthesizer {
        async fn synthesize(&self, text: &str, _settings: &VoiceSettings) {
            if let Ok(mut spoken) = self.spoken.lock() {
                spoken.push(text.to_owned());
            }
            if self.blocking {
                self.release.cancelled().await;
            }
        }

        fn cancel(&self) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
            self.release.cancel();
        }
    }

    fn controller(
        engine: Arc<RecordingSynthesizer>,
    ) -> (SpeechOutput, broadcast::Receiver<UiEvent>) {
        let (ui_tx, ui_rx) = broadcast::channel(64);
        let output = SpeechOutput::new(engine, &SpeechConfig::default(), ui_tx);
        (output, ui_rx)
    }

    async fn settle(output: &SpeechOutput) {
        for _ in 0..200 {
            if output.pending() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn speaks_cleaned_text() {
        let engine = RecordingSynthesizer::new(false);
        let (output, _ui_rx) = controller(Arc::clone(&engine));

        output.speak("**Hello** world.");
        settle(&output).await;

        assert_eq!(engine.spoken(), vec!["Hello world."]);
    }

    #[tokio::test]
    async fn empty_after_cleaning_is_noop() {
        let engine = RecordingSynthesizer::new(false);
        let (output, _ui_rx) = controller(Arc::clone(&engine));

        output.speak("   ");
        output.speak("***");
        output.speak("http://only.a.url");
        settle(&output).await;

        assert!(engine.spoken().is_empty());
        assert_eq!(output.pending(), 0);
    }

    #[tokio::test]
    async fn utterances_play_in_order() {
        let engine = RecordingSynthesizer::new(false);
        let (output, _ui_rx) = controller(Arc::clone(&engine));

        output.speak("First.");
        output.speak("Second.");
        settle(&output).await;

        assert_eq!(engine.spoken(), vec!["First.", "Second."]);
    }

    #[tokio::test]
    async fn talking_indicator_follows_lifecycle() {
        let engine = RecordingSynthesizer::new(false);
        let (output, mut ui_rx) = controller(Arc::clone(&engine));

        output.speak("Hi.");
        settle(&output).await;

        let mut saw_up = false;
        let mut saw_down = false;
        while let Ok(event) = ui_rx.try_recv() {
            match event {
                UiEvent::Talking(true) => saw_up = true,
                UiEvent::Talking(false) => {
                    assert!(saw_up, "indicator lowers only after raising");
                    saw_down = true;
                }
                _ => {}
            }
        }
        assert!(saw_up && saw_down);
    }

    #[tokio::test]
    async fn cancel_aborts_engine_and_forces_idle() {
        let engine = RecordingSynthesizer::new(true);
        let (output, mut ui_rx) = controller(Arc::clone(&engine));

        output.speak("Long speech.");
        // Wait until the engine has started.
        for _ in 0..200 {
            if !engine.spoken().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        output.cancel();
        settle(&output).await;

        assert_eq!(engine.cancelled.load(Ordering::SeqCst), 1);
        let mut forced_idle = false;
        while let Ok(event) = ui_rx.try_recv() {
            if matches!(event, UiEvent::Talking(false)) {
                forced_idle = true;
            }
        }
        assert!(forced_idle);
    }

    #[tokio::test]
    async fn cancel_drops_queued_utterances() {
        let engine = RecordingSynthesizer::new(true);
        let (output, _ui_rx) = controller(Arc::clone(&engine));

        output.speak("One.");
        // Wait for the first utterance to reach the engine so the rest
        // are still queued when cancel arrives.
        for _ in 0..200 {
            if !engine.spoken().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        output.speak("Two.");
        output.speak("Three.");
        output.cancel();
        settle(&output).await;

        assert_eq!(engine.spoken(), vec!["One."]);
    }

    #[tokio::test]
    async fn speech_after_cancel_still_plays() {
        let engine = RecordingSynthesizer::new(false);
        let (output, _ui_rx) = controller(Arc::clone(&engine));

        output.speak("Old.");
        output.cancel();
        output.speak("New.");
        settle(&output).await;

        let spoken = engine.spoken();
        assert_eq!(spoken.last().map(String::as_str), Some("New."));
    }
}
