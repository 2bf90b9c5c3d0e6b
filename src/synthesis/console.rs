use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{SpeechSynthesizer, UtteranceCompletion, UtteranceOutcome, UtteranceRequest, VoiceDescriptor};

/// Simulated speaking time per word at rate 1.0
const MS_PER_WORD: u64 = 300;

/// Granularity of the simulated playback clock
const TICK: Duration = Duration::from_millis(50);

/// Prints each utterance instead of producing audio and simulates its duration
pub struct ConsoleSynthesizer {
    voices: Vec<VoiceDescriptor>,
    speaking: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl ConsoleSynthesizer {
    pub fn new(voices: Vec<VoiceDescriptor>) -> Self {
        Self {
            voices,
            speaking: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            current: Mutex::new(None),
        }
    }

    /// Voices a typical desktop browser reports
    pub fn default_voices() -> Vec<VoiceDescriptor> {
        vec![
            VoiceDescriptor::new("Samantha", "en-US"),
            VoiceDescriptor::new("Google US English", "en-US"),
            VoiceDescriptor::new("Microsoft Ardi Online (Natural) - Indonesian (Indonesia)", "id-ID"),
            VoiceDescriptor::new("Microsoft Gadis Online (Natural) - Indonesian (Indonesia)", "id-ID"),
            VoiceDescriptor::new("Google Bahasa Indonesia", "id-ID"),
            VoiceDescriptor::new("Amira", "ms-MY"),
        ]
    }

    fn abort_current(&self) {
        let current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = current {
            task.abort();
        }
        self.speaking.store(false, Ordering::SeqCst);
    }
}

impl Default for ConsoleSynthesizer {
    fn default() -> Self {
        Self::new(Self::default_voices())
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for ConsoleSynthesizer {
    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.voices.clone()
    }

    async fn voices_changed(&self) {
        std::future::pending::<()>().await
    }

    async fn speak(&self, request: UtteranceRequest) -> Result<UtteranceCompletion> {
        self.abort_current();

        let words = request.text.split_whitespace().count().max(1) as u64;
        let rate = f64::from(request.rate.max(0.1));
        let duration = Duration::from_millis(words * MS_PER_WORD).div_f64(rate);

        let voice = request
            .voice
            .as_ref()
            .map(|v| v.name.as_str())
            .unwrap_or("default voice");
        info!(
            "Speaking with {} (rate={:.2}, pitch={:.2}, volume={:.2}, ~{:.1}s)",
            voice,
            request.rate,
            request.pitch,
            request.volume,
            duration.as_secs_f64()
        );
        println!("{}", request.text);

        let (tx, rx) = oneshot::channel();
        let speaking = Arc::clone(&self.speaking);
        let paused = Arc::clone(&self.paused);
        speaking.store(true, Ordering::SeqCst);

        let task = tokio::spawn(async move {
            let mut remaining = duration;
            while !remaining.is_zero() {
                tokio::time::sleep(TICK).await;
                if !paused.load(Ordering::SeqCst) {
                    remaining = remaining.saturating_sub(TICK);
                }
            }
            speaking.store(false, Ordering::SeqCst);
            let _ = tx.send(UtteranceOutcome::Finished);
        });

        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(task);

        Ok(rx)
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst) && !self.paused.load(Ordering::SeqCst)
    }

    fn pause(&self) {
        debug!("Console synthesizer paused");
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            debug!("Console synthesizer resumed");
        }
    }

    fn cancel(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.abort_current();
    }

    fn name(&self) -> &str {
        "console"
    }
}
