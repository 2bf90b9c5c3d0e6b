use serde::Serialize;
use thiserror::Error;

/// Classified speech recognition errors
///
/// The `Display` text is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    /// The platform has no recognition capability
    #[error("Speech recognition not supported")]
    Unsupported,

    /// Microphone permission was denied
    #[error("Microphone access denied. Please check permissions.")]
    NotAllowed,

    /// No microphone, or the microphone is in use
    #[error("No microphone was found or microphone is busy.")]
    AudioCapture,

    #[error("Network error occurred. Please check your connection.")]
    Network,

    #[error("Speech recognition was aborted.")]
    Aborted,

    #[error("No speech was detected.")]
    NoSpeech,

    /// The recognition service refused this client
    #[error("Speech service is not allowed.")]
    ServiceNotAllowed,

    /// The capability could not be started
    #[error("Failed to start speech recognition: {0}")]
    StartFailed(String),

    /// Any error code not listed above
    #[error("Error with speech recognition ({0})")]
    Other(String),
}

impl RecognitionError {
    /// Map a platform error code (e.g. "not-allowed", "no-speech")
    pub fn from_code(code: &str) -> Self {
        match code {
            "not-allowed" => Self::NotAllowed,
            "audio-capture" => Self::AudioCapture,
            "network" => Self::Network,
            "aborted" => Self::Aborted,
            "no-speech" => Self::NoSpeech,
            "service-not-allowed" => Self::ServiceNotAllowed,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether listening should be retried automatically
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network | Self::Aborted | Self::NoSpeech)
    }
}

impl Serialize for RecognitionError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
