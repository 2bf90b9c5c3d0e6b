use anyhow::{Context, Result};
use chat_voice::recognition::{ListenerEvent, StdinRecognizer};
use chat_voice::synthesis::ConsoleSynthesizer;
use chat_voice::{Config, RecognitionOutcome, Speaker, TextChunker, VoiceCatalog, VoicePreference, VoiceRecognition};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chat-voice", version, about = "Voice pipeline for the chat assistant")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/chat-voice")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print text the way it will be spoken
    Normalize { text: String },

    /// Print the chunks a reply is split into
    Chunk {
        text: String,
        /// Maximum chunk length (defaults to the configured value)
        #[arg(long)]
        max_len: Option<usize>,
    },

    /// Speak a reply through the console synthesizer
    Speak {
        text: String,
        /// auto, male, female or part of a voice name
        #[arg(long)]
        voice: Option<String>,
        #[arg(long)]
        rate: Option<f32>,
    },

    /// List voices with their scores
    Voices {
        #[arg(long, default_value = "auto")]
        voice: String,
    },

    /// Listen on stdin (one line per utterance, `~` prefix for interim)
    Listen,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config).with_context(|| format!("Failed to load config: {}", cli.config))?;

    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Normalize { text } => {
            println!("{}", cfg.synthesis.normalizer().normalize(&text));
        }

        Command::Chunk { text, max_len } => {
            let chunker = TextChunker::with_max_len(max_len.unwrap_or(cfg.synthesis.max_chunk_length));
            let normalized = if cfg.synthesis.clean_special_chars {
                cfg.synthesis.normalizer().normalize(&text)
            } else {
                text
            };
            for chunk in chunker.chunk(&normalized) {
                println!("{}", serde_json::to_string(&chunk)?);
            }
        }

        Command::Speak { text, voice, rate } => {
            let speaker = console_speaker(&cfg);

            let mut options = cfg.synthesis.speak_options();
            if let Some(voice) = voice {
                options.voice = VoicePreference::from(voice);
            }
            if let Some(rate) = rate {
                options.rate = rate;
            }

            let playback = speaker.speak(&text, options);

            tokio::select! {
                status = playback.finished() => info!("Playback finished: {:?}", status),
                _ = tokio::signal::ctrl_c() => {
                    playback.cancel();
                    info!("Playback cancelled: {:?}", playback.finished().await);
                }
            }
        }

        Command::Voices { voice } => {
            let speaker = console_speaker(&cfg);
            let preference = VoicePreference::from(voice);

            for entry in speaker.catalog().ranked(&preference).await {
                println!("{:>3}  {} ({})", entry.score, entry.voice.name, entry.voice.lang);
            }
            match speaker.catalog().best_voice(&preference).await {
                Some(voice) => println!("selected: {}", voice.name),
                None => println!("selected: platform default"),
            }
        }

        Command::Listen => {
            let recognition = VoiceRecognition::new(
                Arc::new(StdinRecognizer::new()),
                cfg.recognition.recognition_config(),
            );

            let (tx, mut rx) = mpsc::unbounded_channel();
            let Some(handle) = recognition.start_listening(tx).await else {
                if let Some(ListenerEvent::End(outcome)) = rx.recv().await {
                    println!("{}", serde_json::to_string(&outcome)?);
                }
                return Ok(());
            };

            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Some(ListenerEvent::Result { text, is_final }) => {
                            info!("{} {}", if is_final { "final:" } else { "interim:" }, text);
                        }
                        Some(ListenerEvent::End(outcome)) => {
                            println!("{}", serde_json::to_string(&outcome)?);
                            if matches!(outcome, RecognitionOutcome::Complete { .. }) {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => handle.stop(),
                }
            }
        }
    }

    Ok(())
}

fn console_speaker(cfg: &Config) -> Speaker {
    let synthesizer = Arc::new(ConsoleSynthesizer::default());
    let catalog = Arc::new(VoiceCatalog::new(
        synthesizer.clone(),
        cfg.synthesis.languages(),
        cfg.synthesis.voices_timeout(),
    ));
    Speaker::new(
        synthesizer,
        catalog,
        cfg.synthesis.normalizer(),
        cfg.synthesis.playback_config(),
    )
}
