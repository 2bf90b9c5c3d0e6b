pub mod config;
pub mod recognition;
pub mod synthesis;
pub mod text;

pub use config::Config;
pub use recognition::{
    ListenerEvent, ListeningHandle, RecognitionConfig, RecognitionError, RecognitionListener, RecognitionOutcome,
    SpeechRecognizer, VoiceRecognition,
};
pub use synthesis::{
    PlaybackHandle, PlaybackStatus, SpeakOptions, Speaker, SpeechSynthesizer, VoiceCatalog, VoiceDescriptor,
    VoicePreference,
};
pub use text::{Chunk, TextChunker, TextNormalizer};
