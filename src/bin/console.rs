//! Console frontend: typed messages on stdin, replies and status on
//! stdout, synthesis replaced by printed lines.
//!
//! Usage: `banter-console [config.toml]`. Falls back to the default
//! config location, then to built-in defaults.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncBufReadExt;
use tracing::info;

use banter::pipeline::messages::{InputEvent, UiEvent};
use banter::speech::{Synthesizer, VoiceSettings};
use banter::transcript::ContextKind;
use banter::{AssistantConfig, TurnCoordinator};

/// Prints utterances instead of synthesizing them.
struct ConsoleSynthesizer;

#[async_trait]
impl Synthesizer for ConsoleSynthesizer {
    async fn synthesize(&self, text: &str, settings: &VoiceSettings) {
        println!("(speaking {}) {text}", settings.language);
    }

    fn cancel(&self) {}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AssistantConfig::load(std::path::Path::new(&path))?,
        None => {
            let path = AssistantConfig::default_path();
            if path.exists() {
                AssistantConfig::load(&path)?
            } else {
                AssistantConfig::default()
            }
        }
    };

    let coordinator = TurnCoordinator::new(config, Arc::new(ConsoleSynthesizer))?;
    let input_tx = coordinator.input_sender();
    let mut ui_rx = coordinator.ui_events();
    let cancel = coordinator.cancel_token();
    let run_handle = tokio::spawn(coordinator.run());

    tokio::spawn(async move {
        loop {
            match ui_rx.recv().await {
                Ok(UiEvent::MessageAppended { role, text }) => println!("{role}: {text}"),
                Ok(UiEvent::Status(text)) => println!("· {text}"),
                Ok(UiEvent::Talking(_) | UiEvent::Listening(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!("type a message; /voice and /chat switch context; /quit exits");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let trimmed = line.trim();
        if trimmed == "/quit" {
            break;
        } else if trimmed == "/voice" {
            let _ = input_tx.send(InputEvent::ContextSwitch(ContextKind::Voice));
        } else if trimmed == "/chat" {
            let _ = input_tx.send(InputEvent::ContextSwitch(ContextKind::Chat));
        } else {
            let _ = input_tx.send(InputEvent::TypedMessage(line));
        }
    }

    cancel.cancel();
    let _ = run_handle.await;
    info!("console session ended");
    Ok(())
}
