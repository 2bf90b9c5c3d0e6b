use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::error::RecognitionError;

/// One alternative transcription inside a recognizer result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub transcript: String,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f32,
}

impl Alternative {
    pub fn new(transcript: impl Into<String>, confidence: f32) -> Self {
        Self {
            transcript: transcript.into(),
            confidence,
        }
    }
}

/// One recognizer result entry with up to `max_alternatives` alternatives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub alternatives: Vec<Alternative>,
    /// Whether the recognizer will not revise this entry any further
    pub is_final: bool,
}

impl RecognitionResult {
    /// Single-alternative result
    pub fn single(transcript: impl Into<String>, confidence: f32, is_final: bool) -> Self {
        Self {
            alternatives: vec![Alternative::new(transcript, confidence)],
            is_final,
        }
    }

    /// The most confident alternative as a hypothesis
    ///
    /// Ties keep the earliest alternative; if no alternative reports a
    /// positive confidence the first one is used.
    pub fn best(&self) -> Option<Hypothesis> {
        let mut best = self.alternatives.first()?;
        for alternative in &self.alternatives[1..] {
            if alternative.confidence > best.confidence {
                best = alternative;
            }
        }

        Some(Hypothesis {
            text: best.transcript.clone(),
            confidence: best.confidence,
            is_final: self.is_final,
        })
    }
}

/// A selected candidate transcription
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    pub text: String,
    pub confidence: f32,
    pub is_final: bool,
}

/// Events emitted by a recognition capability
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// The capability started capturing audio
    Started,
    /// A batch of results; entries before `result_index` are unchanged
    Results {
        result_index: usize,
        results: Vec<RecognitionResult>,
    },
    /// The capability reported an error
    Error(RecognitionError),
    /// The capability stopped listening
    End,
}

impl RecognitionEvent {
    /// Batch holding one result entry
    pub fn result(transcript: impl Into<String>, confidence: f32, is_final: bool) -> Self {
        Self::Results {
            result_index: 0,
            results: vec![RecognitionResult::single(transcript, confidence, is_final)],
        }
    }
}

/// Settings passed to the recognition capability when listening starts
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizerSettings {
    /// BCP 47 language tag (e.g. "id-ID")
    pub language: String,
    /// Keep listening across pauses instead of stopping after one phrase
    pub continuous: bool,
    /// Emit interim (non-final) results
    pub interim_results: bool,
    /// Alternatives requested per result
    pub max_alternatives: u32,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            language: "id-ID".to_string(),
            continuous: true,
            interim_results: true,
            max_alternatives: 3,
        }
    }
}

/// Speech recognition capability trait
///
/// Platform-specific implementations wrap the host's speech-to-text engine.
/// The crate ships a line-based stdin implementation; tests use scripted
/// fakes.
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Whether recognition is supported at all on this platform
    fn is_available(&self) -> bool {
        true
    }

    /// Start listening
    ///
    /// Returns a channel receiver that will receive recognition events. A
    /// closed channel is treated as `End`.
    async fn start(&self, settings: &RecognizerSettings) -> Result<mpsc::Receiver<RecognitionEvent>>;

    /// Stop listening gracefully; pending results are still delivered,
    /// followed by `End`
    fn stop(&self);

    /// Stop listening immediately, discarding pending results
    fn abort(&self);

    /// Get backend name for logging
    fn name(&self) -> &str;
}
