use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::backend::{SpeechSynthesizer, VoiceDescriptor};

/// How long to wait for the platform to publish its voice list
pub const DEFAULT_VOICE_LOAD_TIMEOUT: Duration = Duration::from_millis(1000);

const FALLBACK_SCORE: u32 = 10;

static MALE_TOKENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(male|guy|boy|man)\b").expect("valid male pattern"));
static FEMALE_TOKENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(female|girl|woman)\b").expect("valid female pattern"));

/// Name markers and their weights, highest first
const NAME_RULES: &[(&[&str], u32)] = &[
    (&["neural", "wavenet"], 90),
    (&["premium"], 85),
    (&["natural"], 82),
    (&["microsoft"], 80),
    (&["siri"], 78),
    (&["samsung"], 75),
    (&["google"], 73),
];

const PRIMARY_LANGUAGE_SCORE: u32 = 100;
const RELATED_LANGUAGE_SCORE: u32 = 70;
const BROAD_LANGUAGE_SCORE: u32 = 60;

/// Requested voice
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VoicePreference {
    /// Best voice regardless of gender
    #[default]
    Auto,
    Male,
    Female,
    /// Case-insensitive substring of a voice name
    Named(String),
}

impl From<&str> for VoicePreference {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "" | "auto" => Self::Auto,
            "male" => Self::Male,
            "female" => Self::Female,
            _ => Self::Named(value.trim().to_string()),
        }
    }
}

impl From<String> for VoicePreference {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<VoicePreference> for String {
    fn from(value: VoicePreference) -> Self {
        value.to_string()
    }
}

impl fmt::Display for VoicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Male => write!(f, "male"),
            Self::Female => write!(f, "female"),
            Self::Named(name) => write!(f, "{}", name),
        }
    }
}

impl VoicePreference {
    /// Gender heuristic on a voice name
    ///
    /// `Male` accepts names that carry a male token or no female token, and
    /// `Female` the reverse. Other preferences accept every name.
    pub fn matches_gender(&self, name: &str) -> bool {
        match self {
            Self::Male => MALE_TOKENS.is_match(name) || !FEMALE_TOKENS.is_match(name),
            Self::Female => FEMALE_TOKENS.is_match(name) || !MALE_TOKENS.is_match(name),
            Self::Auto | Self::Named(_) => true,
        }
    }
}

/// Languages the scorer favours, by primary subtag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePreference {
    /// Language the assistant speaks (e.g. "id")
    pub primary: String,
    /// Closely related fallback (e.g. "ms")
    pub related: String,
    /// Broadly supported fallback (e.g. "en")
    pub broad: String,
}

impl Default for LanguagePreference {
    fn default() -> Self {
        Self {
            primary: "id".to_string(),
            related: "ms".to_string(),
            broad: "en".to_string(),
        }
    }
}

impl LanguagePreference {
    /// Build from a full language tag such as "id-ID"
    pub fn for_tag(tag: &str) -> Self {
        Self {
            primary: primary_subtag(tag).to_string(),
            ..Self::default()
        }
    }
}

fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

fn lang_matches(voice: &VoiceDescriptor, language: &str) -> bool {
    primary_subtag(&voice.lang).eq_ignore_ascii_case(language)
}

/// Score a voice for a preference
///
/// Rules are independent: the score is the highest matching weight, never a
/// sum. Every voice scores at least the fallback weight.
pub fn score_voice(
    voice: &VoiceDescriptor,
    preference: &VoicePreference,
    languages: &LanguagePreference,
) -> u32 {
    if !preference.matches_gender(&voice.name) {
        return FALLBACK_SCORE;
    }

    let name = voice.name.to_lowercase();
    let mut score = FALLBACK_SCORE;

    if lang_matches(voice, &languages.primary) {
        score = score.max(PRIMARY_LANGUAGE_SCORE);
    }

    for (markers, weight) in NAME_RULES {
        if markers.iter().any(|marker| name.contains(marker)) {
            score = score.max(*weight);
        }
    }

    if lang_matches(voice, &languages.related) {
        score = score.max(RELATED_LANGUAGE_SCORE);
    }
    if lang_matches(voice, &languages.broad) {
        score = score.max(BROAD_LANGUAGE_SCORE);
    }

    score
}

/// A voice together with its score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredVoice {
    pub voice: VoiceDescriptor,
    pub score: u32,
}

/// Score every voice, best first; ties keep catalog order
pub fn rank_voices(
    voices: &[VoiceDescriptor],
    preference: &VoicePreference,
    languages: &LanguagePreference,
) -> Vec<ScoredVoice> {
    let mut ranked: Vec<ScoredVoice> = voices
        .iter()
        .map(|voice| ScoredVoice {
            voice: voice.clone(),
            score: score_voice(voice, preference, languages),
        })
        .collect();

    // Stable sort keeps the first of equally scored voices in front
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Pick the best voice for a preference
///
/// A named preference is looked up by case-insensitive substring first and
/// falls back to scored selection when nothing matches.
pub fn select_voice(
    voices: &[VoiceDescriptor],
    preference: &VoicePreference,
    languages: &LanguagePreference,
) -> Option<VoiceDescriptor> {
    if let VoicePreference::Named(wanted) = preference {
        if let Some(voice) = find_by_name(voices, wanted) {
            return Some(voice.clone());
        }
        debug!("No voice matching {:?}, falling back to scored selection", wanted);
    }

    let ranked = rank_voices(voices, preference, languages);
    for entry in ranked.iter().take(3) {
        debug!(
            "Voice candidate: {} ({}): {}",
            entry.voice.name, entry.voice.lang, entry.score
        );
    }

    ranked.into_iter().next().map(|entry| entry.voice)
}

/// Find a voice whose name contains `wanted`, ignoring case
pub fn find_by_name<'a>(voices: &'a [VoiceDescriptor], wanted: &str) -> Option<&'a VoiceDescriptor> {
    let wanted = wanted.to_lowercase();
    voices
        .iter()
        .find(|voice| voice.name.to_lowercase().contains(&wanted))
}

/// Process-wide voice catalog
///
/// The voice list is loaded lazily on first use and kept for the lifetime of
/// the catalog. Concurrent first callers wait on the same load. An empty list
/// is not cached, so a later call enumerates again.
pub struct VoiceCatalog {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    languages: LanguagePreference,
    load_timeout: Duration,
    cached: Mutex<Option<Arc<[VoiceDescriptor]>>>,
}

impl VoiceCatalog {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        languages: LanguagePreference,
        load_timeout: Duration,
    ) -> Self {
        Self {
            synthesizer,
            languages,
            load_timeout,
            cached: Mutex::new(None),
        }
    }

    pub fn languages(&self) -> &LanguagePreference {
        &self.languages
    }

    /// Get the voice list, loading it on first use
    pub async fn voices(&self) -> Arc<[VoiceDescriptor]> {
        let mut cached = self.cached.lock().await;
        if let Some(voices) = cached.as_ref() {
            return Arc::clone(voices);
        }

        let mut voices = self.synthesizer.voices();
        if voices.is_empty() {
            debug!(
                "No voices from {} yet, waiting up to {:?} for the voice list",
                self.synthesizer.name(),
                self.load_timeout
            );
            if tokio::time::timeout(self.load_timeout, self.synthesizer.voices_changed())
                .await
                .is_err()
            {
                debug!("Voice list notification timed out");
            }
            voices = self.synthesizer.voices();
        }

        let voices: Arc<[VoiceDescriptor]> = voices.into();
        if voices.is_empty() {
            warn!(
                "{} reported no voices; the platform default voice will be used",
                self.synthesizer.name()
            );
        } else {
            info!("Voice catalog loaded: {} voices", voices.len());
            *cached = Some(Arc::clone(&voices));
        }

        voices
    }

    /// Best voice for a preference, or `None` when the platform has no voices
    pub async fn best_voice(&self, preference: &VoicePreference) -> Option<VoiceDescriptor> {
        let voices = self.voices().await;
        select_voice(&voices, preference, &self.languages)
    }

    /// Voices ranked for a preference
    pub async fn ranked(&self, preference: &VoicePreference) -> Vec<ScoredVoice> {
        let voices = self.voices().await;
        rank_voices(&voices, preference, &self.languages)
    }
}
