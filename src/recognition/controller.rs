use std::future::pending;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use super::backend::{RecognitionEvent, RecognizerSettings, SpeechRecognizer};
use super::error::RecognitionError;
use super::session::{
    RecognitionOutcome, RecognitionSession, SessionAction, SessionInput, SessionState,
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_SILENCE_TIMEOUT,
};

/// Configuration for listening sessions
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// Settings forwarded to the recognizer
    pub recognizer: RecognizerSettings,
    /// Minimum confidence for a final hypothesis (default: 0.75)
    pub confidence_threshold: f32,
    /// Silence that ends a session (default: 4s)
    pub silence_timeout: Duration,
    /// Delay before retrying after a recoverable error (default: 1s)
    pub restart_delay: Duration,
    /// Delay before starting again after `restart()` (default: 300ms)
    pub manual_restart_delay: Duration,
    /// Consecutive automatic retries allowed; `None` retries forever
    pub max_restarts: Option<u32>,
    /// Upper bound on one session; `None` listens until silence or stop
    pub max_listen_duration: Option<Duration>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            recognizer: RecognizerSettings::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            silence_timeout: DEFAULT_SILENCE_TIMEOUT,
            restart_delay: Duration::from_millis(1000),
            manual_restart_delay: Duration::from_millis(300),
            max_restarts: Some(3),
            max_listen_duration: Some(Duration::from_secs(30)),
        }
    }
}

/// Receives hypotheses and session ends
pub trait RecognitionListener: Send + 'static {
    /// A new hypothesis; `is_final` marks an accepted final transcript
    fn on_result(&mut self, text: &str, is_final: bool);

    /// A session ended; called exactly once per session
    fn on_end(&mut self, outcome: RecognitionOutcome);
}

/// Listener notifications as channel messages
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    Result { text: String, is_final: bool },
    End(RecognitionOutcome),
}

impl RecognitionListener for mpsc::UnboundedSender<ListenerEvent> {
    fn on_result(&mut self, text: &str, is_final: bool) {
        let _ = self.send(ListenerEvent::Result {
            text: text.to_string(),
            is_final,
        });
    }

    fn on_end(&mut self, outcome: RecognitionOutcome) {
        let _ = self.send(ListenerEvent::End(outcome));
    }
}

/// Listener built from two closures
pub struct FnListener<R, E> {
    on_result: R,
    on_end: E,
}

impl<R, E> FnListener<R, E>
where
    R: FnMut(&str, bool) + Send + 'static,
    E: FnMut(RecognitionOutcome) + Send + 'static,
{
    pub fn new(on_result: R, on_end: E) -> Self {
        Self { on_result, on_end }
    }
}

impl<R, E> RecognitionListener for FnListener<R, E>
where
    R: FnMut(&str, bool) + Send + 'static,
    E: FnMut(RecognitionOutcome) + Send + 'static,
{
    fn on_result(&mut self, text: &str, is_final: bool) {
        (self.on_result)(text, is_final)
    }

    fn on_end(&mut self, outcome: RecognitionOutcome) {
        (self.on_end)(outcome)
    }
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Stop,
    Restart,
    AdjustThreshold(f32),
}

struct ListeningShared {
    id: String,
    commands: mpsc::UnboundedSender<Command>,
    task: Mutex<Option<JoinHandle<()>>>,
    done: watch::Sender<bool>,
}

/// Control handle for an active listening request
#[derive(Clone)]
pub struct ListeningHandle {
    shared: Arc<ListeningShared>,
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl ListeningHandle {
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Stop gracefully; the session ends when the recognizer reports its end
    pub fn stop(&self) {
        let _ = self.shared.commands.send(Command::Stop);
    }

    /// Abandon the current attempt and start listening again with a clean
    /// transcript
    pub fn restart(&self) {
        let _ = self.shared.commands.send(Command::Restart);
    }

    /// Change the confidence threshold; values outside [0, 1] are rejected
    pub fn adjust_threshold(&self, threshold: f32) -> bool {
        if !(0.0..=1.0).contains(&threshold) {
            return false;
        }
        self.shared
            .commands
            .send(Command::AdjustThreshold(threshold))
            .is_ok()
    }

    /// Tear the request down immediately without notifying the listener
    pub fn abort(&self) {
        let task = self
            .shared
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(task) = task {
            if !task.is_finished() {
                info!("Aborting listening request: {}", self.shared.id);
                task.abort();
                self.recognizer.abort();
            }
        }
        self.shared.done.send_replace(true);
    }

    /// Whether the request is still listening or waiting to restart
    pub fn is_active(&self) -> bool {
        !*self.shared.done.borrow()
    }

    /// Wait until the request has finished for good
    pub async fn finished(&self) {
        let mut done = self.shared.done.subscribe();
        let _ = done.wait_for(|done| *done).await;
    }
}

/// Entry point for speech recognition
///
/// At most one listening request is active; starting a new one aborts the
/// previous request.
pub struct VoiceRecognition {
    recognizer: Arc<dyn SpeechRecognizer>,
    config: RecognitionConfig,
    active: Mutex<Option<ListeningHandle>>,
}

impl VoiceRecognition {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, config: RecognitionConfig) -> Self {
        Self {
            recognizer,
            config,
            active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// Start listening
    ///
    /// Returns `None` when recognition is unavailable or the recognizer
    /// fails to start; the listener's `on_end` has been called in that case.
    pub async fn start_listening<L: RecognitionListener>(&self, mut listener: L) -> Option<ListeningHandle> {
        if let Some(previous) = self.take_active() {
            previous.abort();
        }

        if !self.recognizer.is_available() {
            error!("Speech recognition is not supported by {}", self.recognizer.name());
            listener.on_end(RecognitionOutcome::failed(RecognitionError::Unsupported));
            return None;
        }

        let events = match self.recognizer.start(&self.config.recognizer).await {
            Ok(events) => events,
            Err(e) => {
                error!("Error initializing speech recognition: {:#}", e);
                listener.on_end(RecognitionOutcome::failed(RecognitionError::StartFailed(
                    format!("{:#}", e),
                )));
                return None;
            }
        };

        let id = format!("listen-{}", uuid::Uuid::new_v4());
        info!(
            "Speech recognition started: {} ({}, {})",
            id,
            self.recognizer.name(),
            self.config.recognizer.language
        );

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (done_tx, _) = watch::channel(false);
        let shared = Arc::new(ListeningShared {
            id: id.clone(),
            commands: commands_tx,
            task: Mutex::new(None),
            done: done_tx,
        });

        let task = ListenTask {
            id,
            recognizer: Arc::clone(&self.recognizer),
            config: self.config.clone(),
            threshold: self.config.confidence_threshold,
            listener,
            commands: commands_rx,
            commands_open: true,
            restarts: 0,
            shared: Arc::clone(&shared),
        };
        let join = tokio::spawn(task.run(events));
        *shared
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(join);

        let handle = ListeningHandle {
            shared,
            recognizer: Arc::clone(&self.recognizer),
        };
        *self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle.clone());

        Some(handle)
    }

    /// Stop the active request gracefully, if any
    pub fn stop(&self) {
        let active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(active) = active {
            active.stop();
        }
    }

    fn take_active(&self) -> Option<ListeningHandle> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

/// Why one attempt stopped
enum AttemptExit {
    /// Session ended; nothing more to do
    Finished,
    /// Recoverable error; retry after the restart delay
    Retry,
    /// `restart()` was called
    Restart,
}

struct ListenTask<L> {
    id: String,
    recognizer: Arc<dyn SpeechRecognizer>,
    config: RecognitionConfig,
    threshold: f32,
    listener: L,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_open: bool,
    restarts: u32,
    shared: Arc<ListeningShared>,
}

impl<L: RecognitionListener> ListenTask<L> {
    async fn run(mut self, mut events: mpsc::Receiver<RecognitionEvent>) {
        loop {
            let delay = match self.run_attempt(events).await {
                AttemptExit::Finished => break,
                AttemptExit::Retry => {
                    if let Some(max) = self.config.max_restarts {
                        if self.restarts >= max {
                            warn!(
                                "Giving up on {} after {} consecutive restarts",
                                self.id, self.restarts
                            );
                            break;
                        }
                    }
                    self.restarts += 1;
                    self.config.restart_delay
                }
                AttemptExit::Restart => {
                    self.restarts = 0;
                    self.config.manual_restart_delay
                }
            };

            if !self.wait_before_restart(delay).await {
                debug!("Restart of {} cancelled by stop", self.id);
                break;
            }

            events = match self.recognizer.start(&self.config.recognizer).await {
                Ok(events) => events,
                Err(e) => {
                    error!("Failed to restart recognition: {:#}", e);
                    break;
                }
            };
            info!("Speech recognition restarted: {} (attempt {})", self.id, self.restarts);
        }

        self.shared.done.send_replace(true);
        info!("Speech recognition finished: {}", self.id);
    }

    /// Run one session until it ends or is restarted
    async fn run_attempt(&mut self, mut events: mpsc::Receiver<RecognitionEvent>) -> AttemptExit {
        let mut session = RecognitionSession::new(self.threshold, self.config.silence_timeout);
        session.begin();

        let listen_deadline = self.config.max_listen_duration.map(|limit| Instant::now() + limit);
        let mut listen_deadline_hit = false;

        loop {
            let input = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        if matches!(event, RecognitionEvent::Results { .. }) {
                            self.restarts = 0;
                        }
                        SessionInput::Platform(event)
                    }
                    None => SessionInput::Platform(RecognitionEvent::End),
                },
                _ = sleep_until_opt(session.silence_deadline()) => SessionInput::SilenceElapsed,
                _ = sleep_until_opt(listen_deadline), if !listen_deadline_hit => {
                    listen_deadline_hit = true;
                    if session.state() == SessionState::Stopping {
                        continue;
                    }
                    info!("Maximum listening time reached for {}, stopping", self.id);
                    SessionInput::Stop
                }
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(Command::Stop) => SessionInput::Stop,
                    Some(Command::Restart) => {
                        info!("Restarting speech recognition: {}", self.id);
                        self.recognizer.abort();
                        return AttemptExit::Restart;
                    }
                    Some(Command::AdjustThreshold(threshold)) => {
                        if session.adjust_threshold(threshold) {
                            self.threshold = threshold;
                            debug!("Confidence threshold set to {:.2}", threshold);
                        }
                        continue;
                    }
                    None => {
                        self.commands_open = false;
                        continue;
                    }
                },
            };

            let mut exit = None;
            for action in session.handle(input, Instant::now()) {
                match action {
                    SessionAction::Emit { text, is_final } => self.listener.on_result(&text, is_final),
                    SessionAction::StopRecognizer => self.recognizer.stop(),
                    SessionAction::Finish(outcome) => {
                        match &outcome {
                            RecognitionOutcome::Complete { transcript, .. } => {
                                info!("Speech recognition ended: {} ({} chars)", self.id, transcript.len())
                            }
                            RecognitionOutcome::Failed { error, recoverable } => {
                                error!(
                                    "Speech recognition error on {}: {} (recoverable={})",
                                    self.id, error, recoverable
                                )
                            }
                        }
                        self.listener.on_end(outcome);
                        exit.get_or_insert(AttemptExit::Finished);
                    }
                    SessionAction::ScheduleRestart => exit = Some(AttemptExit::Retry),
                }
            }

            if let Some(exit) = exit {
                return exit;
            }
        }
    }

    /// Sleep before restarting; false if a stop arrived meanwhile
    async fn wait_before_restart(&mut self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return true,
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(Command::Stop) => return false,
                    Some(Command::AdjustThreshold(threshold)) => self.threshold = threshold,
                    Some(Command::Restart) => {}
                    None => self.commands_open = false,
                },
            }
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
