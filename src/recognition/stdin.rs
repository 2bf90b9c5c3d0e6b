use anyhow::Result;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::backend::{RecognitionEvent, RecognizerSettings, SpeechRecognizer};
use super::error::RecognitionError;

struct StdinSession {
    stop: Arc<Notify>,
    task: JoinHandle<()>,
}

/// Reads one utterance per line; a `~` prefix marks an interim hypothesis
#[derive(Default)]
pub struct StdinRecognizer {
    current: Mutex<Option<StdinSession>>,
}

impl StdinRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_current(&self) -> Option<StdinSession> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

/// Turn one input line into a recognition event
fn line_event(line: &str) -> Option<RecognitionEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match line.strip_prefix('~') {
        Some(interim) => Some(RecognitionEvent::result(interim.trim(), 0.5, false)),
        None => Some(RecognitionEvent::result(line, 1.0, true)),
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for StdinRecognizer {
    async fn start(&self, settings: &RecognizerSettings) -> Result<mpsc::Receiver<RecognitionEvent>> {
        if let Some(previous) = self.take_current() {
            previous.task.abort();
        }

        debug!("Reading {} speech from stdin", settings.language);

        let (tx, rx) = mpsc::channel(16);
        let stop = Arc::new(Notify::new());
        let stop_signal = Arc::clone(&stop);

        let task = tokio::spawn(async move {
            if tx.send(RecognitionEvent::Started).await.is_err() {
                return;
            }

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                tokio::select! {
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            if let Some(event) = line_event(&line) {
                                if tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!("Failed to read stdin: {}", e);
                            let _ = tx
                                .send(RecognitionEvent::Error(RecognitionError::AudioCapture))
                                .await;
                            break;
                        }
                    },
                    _ = stop_signal.notified() => break,
                }
            }

            let _ = tx.send(RecognitionEvent::End).await;
        });

        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(StdinSession { stop, task });

        Ok(rx)
    }

    fn stop(&self) {
        if let Some(current) = self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).as_ref() {
            current.stop.notify_one();
        }
    }

    fn abort(&self) {
        if let Some(current) = self.take_current() {
            current.task.abort();
        }
    }

    fn name(&self) -> &str {
        "stdin"
    }
}
