//! Speech recognition session management
//!
//! This module provides the listening pipeline on top of an injected
//! [`SpeechRecognizer`]:
//! - Confidence-based arbitration between interim and final hypotheses
//! - Silence detection that ends a session after a quiet period
//! - Error classification with bounded automatic restarts
//! - A single clean transcript reported when the session ends

mod backend;
mod controller;
mod error;
mod session;
mod stdin;

pub use backend::{
    Alternative, Hypothesis, RecognitionEvent, RecognitionResult, RecognizerSettings, SpeechRecognizer,
};
pub use controller::{
    FnListener, ListenerEvent, ListeningHandle, RecognitionConfig, RecognitionListener, VoiceRecognition,
};
pub use error::RecognitionError;
pub use session::{
    CompleteStatus, RecognitionOutcome, RecognitionSession, SessionAction, SessionInput, SessionState,
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_SILENCE_TIMEOUT,
};
pub use stdin::StdinRecognizer;
