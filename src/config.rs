use anyhow::{ensure, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::recognition::{RecognitionConfig, RecognizerSettings};
use crate::synthesis::{LanguagePreference, PlaybackConfig, SpeakOptions, VoicePreference};
use crate::text::{TextNormalizer, DEFAULT_CODE_PLACEHOLDER, DEFAULT_MAX_CHUNK_LEN};

/// Prefix for environment overrides, e.g. `CHAT_VOICE__SYNTHESIS__RATE=1.2`
const ENV_PREFIX: &str = "CHAT_VOICE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub recognition: RecognitionSettings,
    pub synthesis: SynthesisSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "chat-voice".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    pub language: String,
    pub confidence_threshold: f32,
    pub silence_timeout_ms: u64,
    pub max_alternatives: u32,
    pub restart_delay_ms: u64,
    pub manual_restart_delay_ms: u64,
    /// 0 disables the limit
    pub max_restarts: u32,
    /// 0 disables the limit
    pub max_listen_secs: u64,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            language: "id-ID".to_string(),
            confidence_threshold: 0.75,
            silence_timeout_ms: 4000,
            max_alternatives: 3,
            restart_delay_ms: 1000,
            manual_restart_delay_ms: 300,
            max_restarts: 3,
            max_listen_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub voice: VoicePreference,
    pub clean_special_chars: bool,
    pub max_chunk_length: usize,
    pub code_placeholder: String,
    pub voices_timeout_ms: u64,
    pub resume_poll_ms: u64,
    pub chunk_gap_ms: u64,
    pub error_gap_ms: u64,
    pub rejected_gap_ms: u64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            language: "id-ID".to_string(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: VoicePreference::Auto,
            clean_special_chars: true,
            max_chunk_length: DEFAULT_MAX_CHUNK_LEN,
            code_placeholder: DEFAULT_CODE_PLACEHOLDER.to_string(),
            voices_timeout_ms: 1000,
            resume_poll_ms: 250,
            chunk_gap_ms: 50,
            error_gap_ms: 100,
            rejected_gap_ms: 500,
        }
    }
}

impl Config {
    /// Load from a config file (extension optional) plus environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.recognition;
        ensure!(
            (0.0..=1.0).contains(&r.confidence_threshold),
            "recognition.confidence_threshold must be within [0, 1], got {}",
            r.confidence_threshold
        );
        ensure!(r.max_alternatives >= 1, "recognition.max_alternatives must be at least 1");

        let s = &self.synthesis;
        ensure!(
            (0.1..=10.0).contains(&s.rate),
            "synthesis.rate must be within [0.1, 10], got {}",
            s.rate
        );
        ensure!(
            (0.0..=2.0).contains(&s.pitch),
            "synthesis.pitch must be within [0, 2], got {}",
            s.pitch
        );
        ensure!(
            (0.0..=1.0).contains(&s.volume),
            "synthesis.volume must be within [0, 1], got {}",
            s.volume
        );
        ensure!(s.max_chunk_length > 0, "synthesis.max_chunk_length must be positive");
        ensure!(s.resume_poll_ms > 0, "synthesis.resume_poll_ms must be positive");

        Ok(())
    }
}

impl RecognitionSettings {
    pub fn recognition_config(&self) -> RecognitionConfig {
        RecognitionConfig {
            recognizer: RecognizerSettings {
                language: self.language.clone(),
                continuous: true,
                interim_results: true,
                max_alternatives: self.max_alternatives,
            },
            confidence_threshold: self.confidence_threshold,
            silence_timeout: Duration::from_millis(self.silence_timeout_ms),
            restart_delay: Duration::from_millis(self.restart_delay_ms),
            manual_restart_delay: Duration::from_millis(self.manual_restart_delay_ms),
            max_restarts: (self.max_restarts > 0).then_some(self.max_restarts),
            max_listen_duration: (self.max_listen_secs > 0).then(|| Duration::from_secs(self.max_listen_secs)),
        }
    }
}

impl SynthesisSettings {
    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            max_chunk_len: self.max_chunk_length,
            resume_poll_interval: Duration::from_millis(self.resume_poll_ms),
            chunk_gap: Duration::from_millis(self.chunk_gap_ms),
            error_gap: Duration::from_millis(self.error_gap_ms),
            rejected_gap: Duration::from_millis(self.rejected_gap_ms),
        }
    }

    pub fn speak_options(&self) -> SpeakOptions {
        SpeakOptions {
            rate: self.rate,
            pitch: self.pitch,
            volume: self.volume,
            voice: self.voice.clone(),
            clean_special_chars: self.clean_special_chars,
        }
    }

    pub fn languages(&self) -> LanguagePreference {
        LanguagePreference::for_tag(&self.language)
    }

    pub fn normalizer(&self) -> TextNormalizer {
        TextNormalizer::new(self.code_placeholder.clone())
    }

    pub fn voices_timeout(&self) -> Duration {
        Duration::from_millis(self.voices_timeout_ms)
    }
}
