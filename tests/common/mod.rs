// Scripted fakes for the recognition and synthesis capabilities
//
// Both fakes record what the pipeline asked of them so tests can assert on
// calls without a real speech engine.

#![allow(dead_code)]

use anyhow::{bail, Result};
use chat_voice::recognition::{RecognitionEvent, RecognizerSettings, SpeechRecognizer};
use chat_voice::synthesis::{
    SpeechSynthesizer, UtteranceCompletion, UtteranceOutcome, UtteranceRequest, VoiceDescriptor,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};

/// Let spawned tasks run; with a paused clock this also advances time by `ms`
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Recognizer whose events are pushed by the test
///
/// Every `start` opens a new event channel; `stop` ends the latest one the
/// way a platform recognizer does.
#[derive(Default)]
pub struct FakeRecognizer {
    pub unavailable: bool,
    pub fail_start: AtomicBool,
    sessions: Mutex<Vec<mpsc::Sender<RecognitionEvent>>>,
    settings: Mutex<Vec<RecognizerSettings>>,
    pub stops: AtomicUsize,
    pub aborts: AtomicUsize,
}

impl FakeRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn starts(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn last_settings(&self) -> Option<RecognizerSettings> {
        self.settings.lock().unwrap().last().cloned()
    }

    /// Push an event into the most recent session
    pub async fn emit(&self, event: RecognitionEvent) {
        let sender = self.sessions.lock().unwrap().last().cloned();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn abort_count(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for FakeRecognizer {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    async fn start(&self, settings: &RecognizerSettings) -> Result<mpsc::Receiver<RecognitionEvent>> {
        if self.fail_start.load(Ordering::SeqCst) {
            bail!("microphone busy");
        }

        let (tx, rx) = mpsc::channel(32);
        self.sessions.lock().unwrap().push(tx);
        self.settings.lock().unwrap().push(settings.clone());
        Ok(rx)
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(sender) = self.sessions.lock().unwrap().last() {
            let _ = sender.try_send(RecognitionEvent::End);
        }
    }

    fn abort(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// How the fake synthesizer answers one `speak` call
#[derive(Debug, Clone)]
pub enum Reply {
    /// Finish after the given duration
    FinishAfter(Duration),
    /// Report an error after the given duration
    FailAfter(Duration, String),
    /// Finish after the given duration without ever reporting speech
    Stalled(Duration),
    /// Refuse the request outright
    Reject,
    /// Never finish on its own
    Hang,
}

/// Synthesizer that records requests and answers from a script
///
/// Requests without a scripted reply finish after `default_duration`.
pub struct FakeSynthesizer {
    pub unavailable: bool,
    voices: Mutex<Vec<VoiceDescriptor>>,
    pub voices_loaded: Notify,
    pub voice_queries: AtomicUsize,
    replies: Mutex<VecDeque<Reply>>,
    pub default_duration: Duration,
    requests: Mutex<Vec<UtteranceRequest>>,
    pending: Mutex<Vec<oneshot::Sender<UtteranceOutcome>>>,
    pub speaking: AtomicBool,
    pub cancels: AtomicUsize,
    pub resumes: AtomicUsize,
    pub pauses: AtomicUsize,
}

impl FakeSynthesizer {
    pub fn new(voices: Vec<VoiceDescriptor>) -> Self {
        Self {
            unavailable: false,
            voices: Mutex::new(voices),
            voices_loaded: Notify::new(),
            voice_queries: AtomicUsize::new(0),
            replies: Mutex::new(VecDeque::new()),
            default_duration: Duration::from_millis(100),
            requests: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            speaking: AtomicBool::new(false),
            cancels: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
        }
    }

    pub fn indonesian() -> Self {
        Self::new(vec![
            VoiceDescriptor::new("Samantha", "en-US"),
            VoiceDescriptor::new("Google Bahasa Indonesia", "id-ID"),
            VoiceDescriptor::new("Microsoft Gadis Online (Natural) - Indonesian", "id-ID"),
        ])
    }

    pub fn script(&self, replies: impl IntoIterator<Item = Reply>) {
        self.replies.lock().unwrap().extend(replies);
    }

    pub fn set_voices(&self, voices: Vec<VoiceDescriptor>) {
        *self.voices.lock().unwrap() = voices;
        self.voices_loaded.notify_waiters();
    }

    pub fn requests(&self) -> Vec<UtteranceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.requests().into_iter().map(|request| request.text).collect()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.voice_queries.fetch_add(1, Ordering::SeqCst);
        self.voices.lock().unwrap().clone()
    }

    async fn voices_changed(&self) {
        self.voices_loaded.notified().await
    }

    async fn speak(&self, request: UtteranceRequest) -> Result<UtteranceCompletion> {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::FinishAfter(self.default_duration));

        self.requests.lock().unwrap().push(request);

        let (tx, rx) = oneshot::channel();
        match reply {
            Reply::Reject => bail!("synthesis engine refused the utterance"),
            Reply::Hang => {
                self.speaking.store(true, Ordering::SeqCst);
                self.pending.lock().unwrap().push(tx);
            }
            Reply::FinishAfter(after) => {
                self.speaking.store(true, Ordering::SeqCst);
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(UtteranceOutcome::Finished);
                });
            }
            Reply::Stalled(after) => {
                self.speaking.store(false, Ordering::SeqCst);
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(UtteranceOutcome::Finished);
                });
            }
            Reply::FailAfter(after, reason) => {
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(UtteranceOutcome::Failed(reason));
                });
            }
        }
        Ok(rx)
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.speaking.store(false, Ordering::SeqCst);
        self.pending.lock().unwrap().clear();
    }

    fn name(&self) -> &str {
        "fake"
    }
}
