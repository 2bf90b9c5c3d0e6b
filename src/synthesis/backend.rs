use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Metadata describing one synthesis voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    /// Display name reported by the platform (e.g. "Google Bahasa Indonesia")
    pub name: String,
    /// BCP 47 language tag (e.g. "id-ID")
    pub lang: String,
    /// Whether the voice is rendered on-device
    #[serde(default)]
    pub local_service: bool,
    /// Whether the platform marks this voice as its default
    #[serde(default)]
    pub is_default: bool,
}

impl VoiceDescriptor {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            local_service: true,
            is_default: false,
        }
    }
}

/// One utterance submitted to the synthesis engine
#[derive(Debug, Clone)]
pub struct UtteranceRequest {
    /// Text to speak
    pub text: String,
    /// Explicit voice, or `None` for the platform default
    pub voice: Option<VoiceDescriptor>,
    /// Speech rate (0.1 to 10, default 1.0)
    pub rate: f32,
    /// Pitch (0 to 2, default 1.0)
    pub pitch: f32,
    /// Volume (0 to 1, default 1.0)
    pub volume: f32,
}

/// How a submitted utterance ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceOutcome {
    /// The engine finished speaking the utterance
    Finished,
    /// The engine reported an error for this utterance
    Failed(String),
}

/// Resolves once the engine reports the utterance ended
///
/// A dropped sender (e.g. after `cancel`) is treated as the utterance ending.
pub type UtteranceCompletion = oneshot::Receiver<UtteranceOutcome>;

/// Speech synthesis capability trait
///
/// Platform-specific implementations wrap the host's text-to-speech engine.
/// The crate ships a console implementation for dry runs; tests use scripted
/// fakes.
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Whether synthesis is supported at all on this platform
    fn is_available(&self) -> bool {
        true
    }

    /// Currently known voices (may be empty until the platform loads them)
    fn voices(&self) -> Vec<VoiceDescriptor>;

    /// Resolves when the platform signals that its voice list changed
    async fn voices_changed(&self);

    /// Submit an utterance
    ///
    /// Returns an error if the engine refuses the request outright; errors
    /// during playback are reported through the completion instead.
    async fn speak(&self, request: UtteranceRequest) -> Result<UtteranceCompletion>;

    /// Whether the engine is currently producing audio
    fn is_speaking(&self) -> bool;

    /// Pause the current utterance
    fn pause(&self);

    /// Resume a paused (or stalled) utterance
    fn resume(&self);

    /// Stop all audio and drop any queued utterances
    fn cancel(&self);

    /// Get backend name for logging
    fn name(&self) -> &str;
}
