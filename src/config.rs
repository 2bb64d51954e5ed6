//! Deployment configuration.
//!
//! All knobs are fixed per deployment and loaded once from a TOML file
//! (or constructed in code); there is no runtime reconfiguration surface.
//!
//! ```toml
//! [relay]
//! api_url = "https://api.mistral.ai/v1/chat/completions"
//! api_key_env = "BANTER_API_KEY"
//! model = "mistral-large-latest"
//! mode = "streaming"
//!
//! [speech]
//! language = "en-US"
//! rate = 1.1
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AssistantError, Result};
use crate::transcript::ContextKind;

/// Root configuration for the assistant core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Remote completion endpoint settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Speech synthesis settings.
    #[serde(default)]
    pub speech: SpeechConfig,

    /// System prompts for each conversational context.
    #[serde(default)]
    pub contexts: ContextConfig,
}

impl AssistantConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Config`] if the file cannot be read,
    /// fails to parse, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AssistantError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| {
            AssistantError::Config(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// The default per-user config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("banter")
            .join("config.toml")
    }

    /// Check structural invariants that serde defaults cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.relay.api_url.is_empty() {
            return Err(AssistantError::Config("relay.api_url must not be empty".into()));
        }
        if !self.relay.api_url.starts_with("http") {
            return Err(AssistantError::Config(format!(
                "relay.api_url must be an http(s) URL, got '{}'",
                self.relay.api_url
            )));
        }
        if self.relay.model.is_empty() {
            return Err(AssistantError::Config("relay.model must not be empty".into()));
        }
        if self.speech.rate <= 0.0 {
            return Err(AssistantError::Config(format!(
                "speech.rate must be positive, got {}",
                self.speech.rate
            )));
        }
        Ok(())
    }
}

/// Which response mode the relay client operates in.
///
/// Selected by configuration, never auto-detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Server-sent fragment stream; speech starts sentence-by-sentence.
    #[default]
    Streaming,
    /// One JSON response; the reply is spoken in full on arrival.
    SingleShot,
}

/// Remote completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Full URL of the chat-completion endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer credential, inlined. Prefer `api_key_env`.
    #[serde(default)]
    pub api_key: String,

    /// Name of an environment variable holding the bearer credential.
    /// Takes precedence over `api_key` when set.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Response mode (streaming vs single-shot).
    #[serde(default)]
    pub mode: ResponseMode,

    /// Web-search augmentation, sent only in single-shot mode.
    #[serde(default)]
    pub web_search: Option<WebSearchConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            api_key_env: None,
            model: default_model(),
            mode: ResponseMode::default(),
            web_search: None,
        }
    }
}

impl RelayConfig {
    /// Resolve the bearer credential, consulting the environment first.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Config`] when no credential is available.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(var) = &self.api_key_env {
            return std::env::var(var).map_err(|_| {
                AssistantError::Config(format!(
                    "credential environment variable {var} is not set"
                ))
            });
        }
        if self.api_key.is_empty() {
            return Err(AssistantError::Config(
                "no API credential configured (set relay.api_key or relay.api_key_env)".into(),
            ));
        }
        Ok(self.api_key.clone())
    }
}

fn default_api_url() -> String {
    "https://api.mistral.ai/v1/chat/completions".into()
}

fn default_model() -> String {
    "mistral-large-latest".into()
}

/// Provider web-search augmentation options (single-shot mode only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// How much search context the provider should gather.
    #[serde(default = "default_search_context_size")]
    pub search_context_size: String,

    /// ISO country code for the approximate-location hint.
    pub country: String,

    /// Optional city for the approximate-location hint.
    #[serde(default)]
    pub city: Option<String>,

    /// Optional region for the approximate-location hint.
    #[serde(default)]
    pub region: Option<String>,
}

fn default_search_context_size() -> String {
    "medium".into()
}

/// Speech synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// BCP-47 language tag passed to the synthesizer.
    #[serde(default = "default_language")]
    pub language: String,

    /// Speech rate multiplier. Slightly above normal for responsiveness.
    #[serde(default = "default_rate")]
    pub rate: f32,

    /// Strip hyperlink syntax before synthesis (`[label](url)` → label,
    /// bare URLs removed). Markdown emphasis markers are always stripped.
    #[serde(default = "default_true")]
    pub strip_links: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            rate: default_rate(),
            strip_links: true,
        }
    }
}

fn default_language() -> String {
    "en-US".into()
}

fn default_rate() -> f32 {
    1.1
}

fn default_true() -> bool {
    true
}

/// System prompts for each conversational context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Context for spoken conversation.
    #[serde(default = "default_voice_context")]
    pub voice: String,

    /// Context for typed conversation.
    #[serde(default = "default_chat_context")]
    pub chat: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            voice: default_voice_context(),
            chat: default_chat_context(),
        }
    }
}

impl ContextConfig {
    /// The system prompt for the given context kind.
    pub fn system_prompt(&self, kind: ContextKind) -> &str {
        match kind {
            ContextKind::Voice => &self.voice,
            ContextKind::Chat => &self.chat,
        }
    }
}

fn default_voice_context() -> String {
    "You are a helpful voice assistant. Answer briefly in plain sentences \
     suitable for being read aloud."
        .into()
}

fn default_chat_context() -> String {
    "You are a helpful assistant. Answer thoroughly; markdown formatting \
     is allowed."
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AssistantConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.relay.mode, ResponseMode::Streaming);
        assert!((config.speech.rate - 1.1).abs() < f32::EPSILON);
        assert!(config.speech.strip_links);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: AssistantConfig = match toml::from_str("") {
            Ok(c) => c,
            Err(e) => unreachable!("empty config must parse: {e}"),
        };
        assert_eq!(config.relay.model, "mistral-large-latest");
        assert_eq!(config.speech.language, "en-US");
    }

    #[test]
    fn parses_single_shot_with_web_search() {
        let raw = r#"
            [relay]
            mode = "single_shot"

            [relay.web_search]
            search_context_size = "low"
            country = "KR"
            city = "Daejeon"
        "#;
        let config: AssistantConfig = match toml::from_str(raw) {
            Ok(c) => c,
            Err(e) => unreachable!("config must parse: {e}"),
        };
        assert_eq!(config.relay.mode, ResponseMode::SingleShot);
        let search = config.relay.web_search;
        assert!(search.is_some());
        if let Some(search) = search {
            assert_eq!(search.search_context_size, "low");
            assert_eq!(search.country, "KR");
            assert_eq!(search.city.as_deref(), Some("Daejeon"));
            assert!(search.region.is_none());
        }
    }

    #[test]
    fn validate_rejects_empty_url() {
        let mut config = AssistantConfig::default();
        config.relay.api_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_http_url() {
        let mut config = AssistantConfig::default();
        config.relay.api_url = "ftp://example.com".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_rate() {
        let mut config = AssistantConfig::default();
        config.speech.rate = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_api_key_prefers_env() {
        // Unique variable name so parallel tests cannot collide.
        let var = "BANTER_TEST_CREDENTIAL_PREFERS_ENV";
        unsafe { std::env::set_var(var, "from-env") };
        let config = RelayConfig {
            api_key: "inline".into(),
            api_key_env: Some(var.into()),
            ..RelayConfig::default()
        };
        let key = config.resolve_api_key();
        unsafe { std::env::remove_var(var) };
        assert_eq!(key.ok().as_deref(), Some("from-env"));
    }

    #[test]
    fn resolve_api_key_inline_fallback() {
        let config = RelayConfig {
            api_key: "inline".into(),
            ..RelayConfig::default()
        };
        assert_eq!(config.resolve_api_key().ok().as_deref(), Some("inline"));
    }

    #[test]
    fn resolve_api_key_missing_errors() {
        let config = RelayConfig::default();
        assert!(config.resolve_api_key().is_err());
    }

    #[test]
    fn load_round_trip() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => unreachable!("tempdir creation succeeds: {e}"),
        };
        let path = dir.path().join("config.toml");
        let raw = r#"
            [relay]
            api_url = "https://example.test/v1/chat/completions"
            api_key = "secret"
            model = "test-model"

            [speech]
            language = "ko-KR"
            rate = 1.25
            strip_links = false
        "#;
        if std::fs::write(&path, raw).is_err() {
            unreachable!("config file write succeeds");
        }

        let config = match AssistantConfig::load(&path) {
            Ok(c) => c,
            Err(e) => unreachable!("config load succeeds: {e}"),
        };
        assert_eq!(config.relay.model, "test-model");
        assert_eq!(config.speech.language, "ko-KR");
        assert!(!config.speech.strip_links);
    }

    #[test]
    fn load_missing_file_errors() {
        let result = AssistantConfig::load(Path::new("/nonexistent/banter/config.toml"));
        assert!(matches!(result, Err(AssistantError::Config(_))));
    }

    #[test]
    fn system_prompt_selects_by_kind() {
        let contexts = ContextConfig {
            voice: "v".into(),
            chat: "c".into(),
        };
        assert_eq!(contexts.system_prompt(ContextKind::Voice), "v");
        assert_eq!(contexts.system_prompt(ContextKind::Chat), "c");
    }
}
