//! Speech synthesis: voice selection and sequential chunk playback
//!
//! The platform engine is injected through [`SpeechSynthesizer`]; everything
//! above it (normalization, chunking, voice scoring, queueing) lives here.

pub mod backend;
pub mod console;
pub mod playback;
pub mod voices;

pub use backend::{SpeechSynthesizer, UtteranceCompletion, UtteranceOutcome, UtteranceRequest, VoiceDescriptor};
pub use console::ConsoleSynthesizer;
pub use playback::{PlaybackConfig, PlaybackHandle, PlaybackStatus, SpeakOptions, Speaker, DEFAULT_VOICE_SAMPLE};
pub use voices::{
    rank_voices, score_voice, select_voice, LanguagePreference, ScoredVoice, VoiceCatalog, VoicePreference,
    DEFAULT_VOICE_LOAD_TIMEOUT,
};
