use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::backend::{Hypothesis, RecognitionEvent, RecognitionResult};
use super::error::RecognitionError;

/// Default minimum confidence for a final hypothesis
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.75;

/// Default silence period that ends a session
pub const DEFAULT_SILENCE_TIMEOUT: Duration = Duration::from_millis(4000);

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, recognizer not started yet
    Idle,
    /// Recognizer running, no speech heard yet
    Listening,
    /// Speech heard; the silence timer is running
    SilenceArmed,
    /// Stop requested; waiting for the recognizer to end
    Stopping,
    /// Terminal
    Ended,
}

/// How a session ended, as reported to the listener
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecognitionOutcome {
    /// The recognizer ended normally (stop, silence or natural end)
    Complete { transcript: String, status: CompleteStatus },
    /// The recognizer failed
    Failed { error: RecognitionError, recoverable: bool },
}

/// Status marker serialized alongside a complete transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompleteStatus {
    Complete,
}

impl RecognitionOutcome {
    pub fn complete(transcript: impl Into<String>) -> Self {
        Self::Complete {
            transcript: transcript.into(),
            status: CompleteStatus::Complete,
        }
    }

    pub fn failed(error: RecognitionError) -> Self {
        let recoverable = error.is_recoverable();
        Self::Failed { error, recoverable }
    }

    pub fn transcript(&self) -> Option<&str> {
        match self {
            Self::Complete { transcript, .. } => Some(transcript),
            Self::Failed { .. } => None,
        }
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    /// Event from the recognition capability
    Platform(RecognitionEvent),
    /// The silence deadline passed
    SilenceElapsed,
    /// Graceful stop requested
    Stop,
}

/// Side effects requested by the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Report a hypothesis to the listener
    Emit { text: String, is_final: bool },
    /// Ask the recognizer to stop gracefully
    StopRecognizer,
    /// Report the end of the session to the listener
    Finish(RecognitionOutcome),
    /// Start a fresh session after the restart delay
    ScheduleRestart,
}

/// One listening attempt
///
/// Every input goes through `handle`, which updates the state and returns the
/// side effects for the driver to perform. The session never touches the
/// platform or the clock itself.
#[derive(Debug, Clone)]
pub struct RecognitionSession {
    state: SessionState,
    final_transcript: String,
    last_speech: Option<Instant>,
    silence_deadline: Option<Instant>,
    silence_timeout: Duration,
    confidence_threshold: f32,
    is_new_utterance: bool,
}

impl Default for RecognitionSession {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_SILENCE_TIMEOUT)
    }
}

impl RecognitionSession {
    pub fn new(confidence_threshold: f32, silence_timeout: Duration) -> Self {
        Self {
            state: SessionState::Idle,
            final_transcript: String::new(),
            last_speech: None,
            silence_deadline: None,
            silence_timeout,
            confidence_threshold,
            is_new_utterance: true,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn final_transcript(&self) -> &str {
        &self.final_transcript
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn last_speech(&self) -> Option<Instant> {
        self.last_speech
    }

    /// When the silence timer fires, if armed
    pub fn silence_deadline(&self) -> Option<Instant> {
        self.silence_deadline
    }

    /// Mark the recognizer as started
    pub fn begin(&mut self) {
        if self.state == SessionState::Idle {
            self.state = SessionState::Listening;
        }
    }

    /// Change the confidence threshold; values outside [0, 1] are rejected
    pub fn adjust_threshold(&mut self, threshold: f32) -> bool {
        if (0.0..=1.0).contains(&threshold) {
            self.confidence_threshold = threshold;
            true
        } else {
            false
        }
    }

    /// Apply one input and return the side effects to perform
    pub fn handle(&mut self, input: SessionInput, now: Instant) -> Vec<SessionAction> {
        if self.state == SessionState::Ended {
            return Vec::new();
        }

        match input {
            SessionInput::Platform(RecognitionEvent::Started) => {
                self.begin();
                self.is_new_utterance = true;
                self.final_transcript.clear();
                Vec::new()
            }
            SessionInput::Platform(RecognitionEvent::Results {
                result_index,
                results,
            }) => self.on_results(result_index, &results, now),
            SessionInput::Platform(RecognitionEvent::Error(error)) => self.on_error(error),
            SessionInput::Platform(RecognitionEvent::End) => self.on_end(),
            SessionInput::SilenceElapsed => self.on_silence(now),
            SessionInput::Stop => self.on_stop(),
        }
    }

    fn on_results(
        &mut self,
        result_index: usize,
        results: &[RecognitionResult],
        now: Instant,
    ) -> Vec<SessionAction> {
        if self.is_new_utterance {
            self.final_transcript.clear();
            self.is_new_utterance = false;
        }

        let mut interim: Option<Hypothesis> = None;

        for hypothesis in results.iter().skip(result_index).filter_map(RecognitionResult::best) {
            if hypothesis.is_final {
                if hypothesis.confidence >= self.confidence_threshold {
                    // Recognizers revise earlier words, so the newest final wins
                    self.final_transcript = hypothesis.text;
                } else {
                    debug!(
                        "Discarding low-confidence final hypothesis ({:.2} < {:.2})",
                        hypothesis.confidence, self.confidence_threshold
                    );
                }
            } else {
                interim = Some(hypothesis);
            }
        }

        self.last_speech = Some(now);
        if self.state != SessionState::Stopping {
            self.silence_deadline = Some(now + self.silence_timeout);
            self.state = SessionState::SilenceArmed;
        }

        match interim {
            Some(hypothesis) if !hypothesis.text.is_empty() => vec![SessionAction::Emit {
                text: hypothesis.text,
                is_final: false,
            }],
            _ if !self.final_transcript.is_empty() => vec![SessionAction::Emit {
                text: self.final_transcript.clone(),
                is_final: true,
            }],
            _ => Vec::new(),
        }
    }

    fn on_silence(&mut self, now: Instant) -> Vec<SessionAction> {
        match self.silence_deadline {
            Some(deadline) if now >= deadline => {
                debug!("Silence detected for {:?}, stopping recognizer", self.silence_timeout);
                self.silence_deadline = None;
                self.state = SessionState::Stopping;
                vec![SessionAction::StopRecognizer]
            }
            _ => Vec::new(),
        }
    }

    fn on_stop(&mut self) -> Vec<SessionAction> {
        self.silence_deadline = None;
        if self.state == SessionState::Stopping {
            return Vec::new();
        }
        self.state = SessionState::Stopping;
        vec![SessionAction::StopRecognizer]
    }

    fn on_error(&mut self, error: RecognitionError) -> Vec<SessionAction> {
        self.silence_deadline = None;
        self.state = SessionState::Ended;

        let recoverable = error.is_recoverable();
        let mut actions = vec![SessionAction::Finish(RecognitionOutcome::failed(error))];
        if recoverable {
            actions.push(SessionAction::ScheduleRestart);
        }
        actions
    }

    fn on_end(&mut self) -> Vec<SessionAction> {
        self.silence_deadline = None;
        self.state = SessionState::Ended;
        self.is_new_utterance = true;

        vec![SessionAction::Finish(RecognitionOutcome::complete(
            self.final_transcript.trim(),
        ))]
    }
}
