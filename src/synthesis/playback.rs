use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::backend::{SpeechSynthesizer, UtteranceCompletion, UtteranceOutcome, UtteranceRequest, VoiceDescriptor};
use super::voices::{find_by_name, VoiceCatalog, VoicePreference};
use crate::text::{Chunk, TextChunker, TextNormalizer};

/// Sentence spoken by `test_voice` when no sample text is given
pub const DEFAULT_VOICE_SAMPLE: &str = "Halo, ini adalah tes suara. Bagaimana kualitas suara ini?";

/// Per-call speech settings
#[derive(Debug, Clone)]
pub struct SpeakOptions {
    /// Speech rate (0.1 to 10)
    pub rate: f32,
    /// Pitch (0 to 2)
    pub pitch: f32,
    /// Volume (0 to 1)
    pub volume: f32,
    /// Voice to use
    pub voice: VoicePreference,
    /// Strip markup before speaking
    pub clean_special_chars: bool,
}

impl Default for SpeakOptions {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: VoicePreference::Auto,
            clean_special_chars: true,
        }
    }
}

/// Shortest stalled-engine poll interval
const MIN_RESUME_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Timing and chunking settings for the playback queue
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Maximum chunk length in characters
    pub max_chunk_len: usize,
    /// Interval of the stalled-engine resume poll
    pub resume_poll_interval: Duration,
    /// Pause after a chunk finishes
    pub chunk_gap: Duration,
    /// Pause after a chunk fails
    pub error_gap: Duration,
    /// Pause after the engine refuses a chunk
    pub rejected_gap: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_chunk_len: crate::text::DEFAULT_MAX_CHUNK_LEN,
            resume_poll_interval: Duration::from_millis(250),
            chunk_gap: Duration::from_millis(50),
            error_gap: Duration::from_millis(100),
            rejected_gap: Duration::from_millis(500),
        }
    }
}

/// State of a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    /// Chunks are still being spoken
    Speaking,
    /// Every chunk was spoken (failed chunks are skipped)
    Completed,
    /// `cancel()` was called or a newer session superseded this one
    Cancelled,
    /// The platform has no synthesis capability
    Unsupported,
}

impl PlaybackStatus {
    pub fn is_finished(self) -> bool {
        self != Self::Speaking
    }
}

struct PlaybackShared {
    id: String,
    status: watch::Sender<PlaybackStatus>,
    paused: AtomicBool,
}

/// Control handle for one playback session
///
/// Controls act only while the session is still speaking, so a stale handle
/// never touches audio that belongs to a newer session.
#[derive(Clone)]
pub struct PlaybackHandle {
    shared: Arc<PlaybackShared>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl PlaybackHandle {
    fn new(synthesizer: Arc<dyn SpeechSynthesizer>, status: PlaybackStatus) -> Self {
        let (status, _) = watch::channel(status);
        Self {
            shared: Arc::new(PlaybackShared {
                id: format!("speech-{}", uuid::Uuid::new_v4()),
                status,
                paused: AtomicBool::new(false),
            }),
            synthesizer,
        }
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn status(&self) -> PlaybackStatus {
        *self.shared.status.borrow()
    }

    /// Pause the current utterance without moving the queue position
    pub fn pause(&self) {
        if self.status() == PlaybackStatus::Speaking {
            self.shared.paused.store(true, Ordering::SeqCst);
            self.synthesizer.pause();
        }
    }

    /// Resume after `pause`
    pub fn resume(&self) {
        if self.status() == PlaybackStatus::Speaking {
            self.shared.paused.store(false, Ordering::SeqCst);
            self.synthesizer.resume();
        }
    }

    /// Stop audio immediately and drop the remaining chunks
    pub fn cancel(&self) {
        let cancelled = self.shared.status.send_if_modified(|status| {
            if *status == PlaybackStatus::Speaking {
                *status = PlaybackStatus::Cancelled;
                true
            } else {
                false
            }
        });

        if cancelled {
            info!("Playback cancelled: {}", self.shared.id);
            self.synthesizer.cancel();
        }
    }

    /// Wait until the session completes or is cancelled
    pub async fn finished(&self) -> PlaybackStatus {
        let mut status = self.shared.status.subscribe();
        wait_finished(&mut status).await;
        self.status()
    }

    fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    fn complete(&self) {
        self.shared.status.send_if_modified(|status| {
            if *status == PlaybackStatus::Speaking {
                *status = PlaybackStatus::Completed;
                true
            } else {
                false
            }
        });
    }
}

/// Resolves once the status leaves `Speaking`
async fn wait_finished(status: &mut watch::Receiver<PlaybackStatus>) {
    loop {
        if status.borrow_and_update().is_finished() {
            return;
        }
        if status.changed().await.is_err() {
            return;
        }
    }
}

/// Speaks assistant replies through a synthesis capability
pub struct Speaker {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    catalog: Arc<VoiceCatalog>,
    normalizer: TextNormalizer,
    chunker: TextChunker,
    config: PlaybackConfig,
    active: Mutex<Option<PlaybackHandle>>,
}

impl Speaker {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        catalog: Arc<VoiceCatalog>,
        normalizer: TextNormalizer,
        mut config: PlaybackConfig,
    ) -> Self {
        if config.resume_poll_interval < MIN_RESUME_POLL_INTERVAL {
            warn!(
                "Resume poll interval {:?} too short, using {:?}",
                config.resume_poll_interval, MIN_RESUME_POLL_INTERVAL
            );
            config.resume_poll_interval = MIN_RESUME_POLL_INTERVAL;
        }

        info!(
            "Speaker initialized: {} (chunks: {} chars)",
            synthesizer.name(),
            config.max_chunk_len
        );

        Self {
            chunker: TextChunker::with_max_len(config.max_chunk_len),
            synthesizer,
            catalog,
            normalizer,
            config,
            active: Mutex::new(None),
        }
    }

    pub fn catalog(&self) -> &Arc<VoiceCatalog> {
        &self.catalog
    }

    /// Normalize (if enabled) and chunk `text` the way `speak` does
    pub fn prepare(&self, text: &str, clean_special_chars: bool) -> Vec<Chunk> {
        if clean_special_chars {
            self.chunker.chunk(&self.normalizer.normalize(text))
        } else {
            self.chunker.chunk(text)
        }
    }

    /// Start speaking `text`
    ///
    /// Any earlier session is cancelled first. Must be called from within a
    /// tokio runtime; playback runs on a spawned task.
    pub fn speak(&self, text: &str, options: SpeakOptions) -> PlaybackHandle {
        let chunks = self.prepare(text, options.clean_special_chars);
        self.start(chunks, options)
    }

    fn start(&self, chunks: Vec<Chunk>, options: SpeakOptions) -> PlaybackHandle {
        if let Some(previous) = self.take_active() {
            previous.cancel();
        }

        if !self.synthesizer.is_available() {
            warn!("Text-to-speech is not supported by {}", self.synthesizer.name());
            return PlaybackHandle::new(Arc::clone(&self.synthesizer), PlaybackStatus::Unsupported);
        }

        self.synthesizer.cancel();

        let handle = PlaybackHandle::new(Arc::clone(&self.synthesizer), PlaybackStatus::Speaking);

        info!("Starting playback {} ({} chunks)", handle.id(), chunks.len());

        self.set_active(handle.clone());

        let task = PlaybackTask {
            handle: handle.clone(),
            synthesizer: Arc::clone(&self.synthesizer),
            catalog: Arc::clone(&self.catalog),
            config: self.config.clone(),
            options,
            chunks,
        };
        tokio::spawn(task.run());

        handle
    }

    /// Cancel the active session, if any
    pub fn cancel(&self) {
        if let Some(active) = self.take_active() {
            active.cancel();
        }
    }

    /// The cached voice list
    pub async fn list_voices(&self) -> Vec<VoiceDescriptor> {
        self.catalog.voices().await.to_vec()
    }

    /// Speak a sample sentence with the voice whose name contains `name`
    ///
    /// The sample is sent as one utterance, exactly as given. Returns the
    /// voice, or `None` when no voice matches.
    pub async fn test_voice(&self, name: &str, sample: Option<&str>) -> Option<VoiceDescriptor> {
        let voices = self.catalog.voices().await;
        let Some(voice) = find_by_name(&voices, name).cloned() else {
            error!("Voice containing \"{}\" not found", name);
            return None;
        };

        info!("Testing voice: {} ({})", voice.name, voice.lang);

        let options = SpeakOptions {
            rate: 0.95,
            pitch: 1.05,
            voice: VoicePreference::Named(voice.name.clone()),
            ..SpeakOptions::default()
        };
        let sample = sample.unwrap_or(DEFAULT_VOICE_SAMPLE);
        let chunk = Chunk {
            index: 0,
            content: sample.to_string(),
            start: 0,
            end: sample.chars().count(),
        };
        self.start(vec![chunk], options);

        Some(voice)
    }

    fn take_active(&self) -> Option<PlaybackHandle> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    fn set_active(&self, handle: PlaybackHandle) {
        *self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
    }
}

/// How waiting on one utterance ended
enum ChunkResult {
    Finished,
    Failed(String),
    Cancelled,
}

struct PlaybackTask {
    handle: PlaybackHandle,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    catalog: Arc<VoiceCatalog>,
    config: PlaybackConfig,
    options: SpeakOptions,
    chunks: Vec<Chunk>,
}

impl PlaybackTask {
    async fn run(self) {
        let mut status = self.handle.shared.status.subscribe();

        let voice = if self.chunks.is_empty() {
            None
        } else {
            self.catalog.best_voice(&self.options.voice).await
        };
        match &voice {
            Some(voice) => debug!("Using voice {} ({})", voice.name, voice.lang),
            None => debug!("Using platform default voice"),
        }

        for chunk in &self.chunks {
            if self.handle.status().is_finished() {
                return;
            }

            let request = UtteranceRequest {
                text: chunk.content.clone(),
                voice: voice.clone(),
                rate: self.options.rate,
                pitch: self.options.pitch,
                volume: self.options.volume,
            };

            debug!(
                "Speaking chunk {}/{} ({} chars)",
                chunk.index + 1,
                self.chunks.len(),
                chunk.content.chars().count()
            );

            let completion = match self.synthesizer.speak(request).await {
                Ok(completion) => completion,
                Err(e) => {
                    error!("Error speaking chunk {}: {:#}", chunk.index, e);
                    if !self.wait_gap(self.config.rejected_gap, &mut status).await {
                        return;
                    }
                    continue;
                }
            };

            let gap = match self.wait_for_utterance(completion, &mut status).await {
                ChunkResult::Finished => self.config.chunk_gap,
                ChunkResult::Failed(reason) => {
                    error!("Speech synthesis error on chunk {}: {}", chunk.index, reason);
                    self.config.error_gap
                }
                ChunkResult::Cancelled => return,
            };

            if !self.wait_gap(gap, &mut status).await {
                return;
            }
        }

        self.handle.complete();
        info!("Playback complete: {}", self.handle.id());
    }

    /// Wait for the utterance to end, nudging a stalled engine
    async fn wait_for_utterance(
        &self,
        mut completion: UtteranceCompletion,
        status: &mut watch::Receiver<PlaybackStatus>,
    ) -> ChunkResult {
        let mut poll = tokio::time::interval(self.config.resume_poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        poll.tick().await;

        loop {
            tokio::select! {
                outcome = &mut completion => {
                    return match outcome {
                        Ok(UtteranceOutcome::Finished) | Err(_) => ChunkResult::Finished,
                        Ok(UtteranceOutcome::Failed(reason)) => ChunkResult::Failed(reason),
                    };
                }
                _ = wait_finished(status) => return ChunkResult::Cancelled,
                _ = poll.tick() => {
                    if !self.handle.is_paused() && !self.synthesizer.is_speaking() {
                        debug!("Synthesizer stalled, resuming");
                        self.synthesizer.resume();
                    }
                }
            }
        }
    }

    /// Sleep between chunks; false when the session ended meanwhile
    async fn wait_gap(&self, gap: Duration, status: &mut watch::Receiver<PlaybackStatus>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(gap) => !self.handle.status().is_finished(),
            _ = wait_finished(status) => false,
        }
    }
}
