// Integration tests for chunked playback and voice selection
//
// These tests drive `Speaker` with a recording synthesizer on a paused clock
// and verify which utterances reach the engine, in what order, and with which
// voice.

mod common;

use anyhow::Result;
use chat_voice::synthesis::{LanguagePreference, PlaybackConfig, DEFAULT_VOICE_SAMPLE};
use chat_voice::{PlaybackStatus, SpeakOptions, Speaker, TextNormalizer, VoiceCatalog, VoiceDescriptor, VoicePreference};
use common::{settle, FakeSynthesizer, Reply};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const LONG_REPLY: &str = "Tentu, saya bisa membantu. Pertama, buka menu pengaturan di pojok kanan atas layar. \
Kedua, pilih bagian akun dan periksa alamat email anda dengan teliti. \
Terakhir, simpan perubahan lalu muat ulang halaman supaya pengaturan baru langsung dipakai oleh aplikasi.";

fn speaker_for(synth: &Arc<FakeSynthesizer>) -> Speaker {
    let catalog = Arc::new(VoiceCatalog::new(
        synth.clone(),
        LanguagePreference::default(),
        Duration::from_millis(1000),
    ));
    Speaker::new(synth.clone(), catalog, TextNormalizer::default(), PlaybackConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_chunks_spoken_in_order() -> Result<()> {
    // Setup: A reply long enough for several chunks
    let synth = Arc::new(FakeSynthesizer::indonesian());
    let speaker = speaker_for(&synth);
    let expected: Vec<String> = speaker
        .prepare(LONG_REPLY, true)
        .into_iter()
        .map(|chunk| chunk.content)
        .collect();
    assert!(expected.len() > 1, "reply should need several chunks");

    let handle = speaker.speak(LONG_REPLY, SpeakOptions::default());
    assert_eq!(handle.status(), PlaybackStatus::Speaking);

    // Verify: Every chunk submitted once, in order, with the best voice
    assert_eq!(handle.finished().await, PlaybackStatus::Completed);
    assert_eq!(synth.spoken(), expected);
    for request in synth.requests() {
        assert_eq!(request.voice.as_ref().map(|v| v.name.as_str()), Some("Google Bahasa Indonesia"));
        assert!(request.text.chars().count() <= 160);
    }

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_next_chunk_waits_for_previous() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::indonesian());
    synth.script([Reply::FinishAfter(Duration::from_secs(2))]);
    let speaker = speaker_for(&synth);

    let handle = speaker.speak(LONG_REPLY, SpeakOptions::default());
    settle(1900).await;
    assert_eq!(synth.requests().len(), 1);

    // First chunk finished at 2s, second goes out after the 50ms gap
    settle(200).await;
    assert_eq!(synth.requests().len(), 2);

    handle.cancel();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_markup_removed_before_speaking() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::indonesian());
    let speaker = speaker_for(&synth);

    let handle = speaker.speak("**Halo** dunia, lihat `main.rs` di contoh.com", SpeakOptions::default());
    handle.finished().await;

    assert_eq!(synth.spoken(), vec!["Halo dunia, lihat main rs di contoh com".to_string()]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_options_forwarded() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::indonesian());
    let speaker = speaker_for(&synth);

    let options = SpeakOptions {
        rate: 1.2,
        pitch: 0.9,
        volume: 0.5,
        voice: VoicePreference::from("gadis"),
        clean_special_chars: false,
    };
    speaker.speak("**tebal**", options).finished().await;

    let requests = synth.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].text, "**tebal**");
    assert_eq!(requests[0].rate, 1.2);
    assert_eq!(requests[0].pitch, 0.9);
    assert_eq!(requests[0].volume, 0.5);
    assert_eq!(
        requests[0].voice.as_ref().map(|v| v.name.as_str()),
        Some("Microsoft Gadis Online (Natural) - Indonesian")
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_remaining_chunks() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::indonesian());
    synth.script([Reply::Hang]);
    let speaker = speaker_for(&synth);

    let handle = speaker.speak(LONG_REPLY, SpeakOptions::default());
    settle(10).await;
    assert_eq!(synth.requests().len(), 1);

    handle.cancel();
    assert_eq!(handle.finished().await, PlaybackStatus::Cancelled);
    settle(5000).await;

    // Verify: Nothing else submitted; engine cancelled on start and on cancel
    assert_eq!(synth.requests().len(), 1);
    assert_eq!(synth.cancel_count(), 2);

    // A second cancel is a no-op
    handle.cancel();
    assert_eq!(synth.cancel_count(), 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_chunk_is_skipped() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::indonesian());
    synth.script([Reply::FailAfter(Duration::from_millis(20), "synthesis-failed".to_string())]);
    let speaker = speaker_for(&synth);
    let expected = speaker.prepare(LONG_REPLY, true).len();

    let handle = speaker.speak(LONG_REPLY, SpeakOptions::default());

    assert_eq!(handle.finished().await, PlaybackStatus::Completed);
    assert_eq!(synth.requests().len(), expected);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_rejected_chunk_is_skipped() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::indonesian());
    synth.script([Reply::Reject]);
    let speaker = speaker_for(&synth);
    let expected = speaker.prepare(LONG_REPLY, true).len();

    let started = Instant::now();
    let handle = speaker.speak(LONG_REPLY, SpeakOptions::default());

    assert_eq!(handle.finished().await, PlaybackStatus::Completed);
    assert_eq!(synth.requests().len(), expected);
    assert!(started.elapsed() >= Duration::from_millis(500));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stalled_engine_is_resumed() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::indonesian());
    synth.script([Reply::Stalled(Duration::from_millis(1000))]);
    let speaker = speaker_for(&synth);

    let handle = speaker.speak("Halo dunia.", SpeakOptions::default());
    assert_eq!(handle.finished().await, PlaybackStatus::Completed);

    // Polled every 250ms while the engine claimed not to be speaking
    assert!(synth.resume_count() >= 3, "resumes: {}", synth.resume_count());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_user_pause_is_not_resumed() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::indonesian());
    synth.script([Reply::Stalled(Duration::from_millis(1000))]);
    let speaker = speaker_for(&synth);

    let handle = speaker.speak("Halo dunia.", SpeakOptions::default());
    settle(10).await;
    handle.pause();
    settle(900).await;

    assert_eq!(synth.pauses.load(Ordering::SeqCst), 1);
    assert_eq!(synth.resume_count(), 0);

    handle.resume();
    assert_eq!(synth.resume_count(), 1);
    handle.finished().await;

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_new_speak_cancels_previous() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::indonesian());
    synth.script([Reply::Hang]);
    let speaker = speaker_for(&synth);

    let first = speaker.speak("Jawaban pertama.", SpeakOptions::default());
    settle(10).await;
    let second = speaker.speak("Jawaban kedua.", SpeakOptions::default());

    assert_eq!(first.status(), PlaybackStatus::Cancelled);
    assert_eq!(second.finished().await, PlaybackStatus::Completed);
    assert_eq!(
        synth.spoken(),
        vec!["Jawaban pertama.".to_string(), "Jawaban kedua.".to_string()]
    );

    // Verify: Stale handle no longer reaches the engine
    first.pause();
    first.cancel();
    assert_eq!(synth.pauses.load(Ordering::SeqCst), 0);
    assert_eq!(second.status(), PlaybackStatus::Completed);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_no_voices_uses_platform_default() -> Result<()> {
    // Setup: Platform never publishes a voice list
    let synth = Arc::new(FakeSynthesizer::new(Vec::new()));
    let speaker = speaker_for(&synth);

    let started = Instant::now();
    let handle = speaker.speak("Halo dunia.", SpeakOptions::default());

    // Verify: Speech proceeds after the load timeout with no explicit voice
    assert_eq!(handle.finished().await, PlaybackStatus::Completed);
    assert!(started.elapsed() >= Duration::from_millis(1000));
    let requests = synth.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].voice.is_none());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_synthesizer() -> Result<()> {
    let mut synth = FakeSynthesizer::indonesian();
    synth.unavailable = true;
    let synth = Arc::new(synth);
    let speaker = speaker_for(&synth);

    let handle = speaker.speak("Halo dunia.", SpeakOptions::default());

    assert_eq!(handle.status(), PlaybackStatus::Unsupported);
    assert_eq!(handle.finished().await, PlaybackStatus::Unsupported);
    assert!(synth.requests().is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_empty_reply_completes_immediately() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::indonesian());
    let speaker = speaker_for(&synth);

    let handle = speaker.speak("  **  ", SpeakOptions::default());

    assert_eq!(handle.finished().await, PlaybackStatus::Completed);
    assert!(synth.requests().is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_voice_list_loaded_once() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::indonesian());
    let speaker = speaker_for(&synth);

    let first = speaker.list_voices().await;
    let second = speaker.list_voices().await;
    speaker.speak("Halo.", SpeakOptions::default()).finished().await;

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
    assert_eq!(synth.voice_queries.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_late_voice_list_is_picked_up() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::new(Vec::new()));
    let speaker = Arc::new(speaker_for(&synth));

    let loader = {
        let speaker = speaker.clone();
        tokio::spawn(async move { speaker.list_voices().await })
    };
    settle(200).await;
    synth.set_voices(vec![VoiceDescriptor::new("Google Bahasa Indonesia", "id-ID")]);

    let started = Instant::now();
    let voices = loader.await?;

    assert_eq!(voices.len(), 1);
    assert!(started.elapsed() < Duration::from_millis(800));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_empty_voice_list_not_cached() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::new(Vec::new()));
    let speaker = speaker_for(&synth);

    assert!(speaker.list_voices().await.is_empty());

    synth.set_voices(vec![VoiceDescriptor::new("Amira", "ms-MY")]);
    let voices = speaker.list_voices().await;

    assert_eq!(voices.len(), 1);
    assert_eq!(voices[0].name, "Amira");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_voice_preview() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::indonesian());
    let speaker = speaker_for(&synth);

    let voice = speaker.test_voice("gadis", None).await.expect("voice should match");
    assert_eq!(voice.name, "Microsoft Gadis Online (Natural) - Indonesian");
    settle(2000).await;

    let requests = synth.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].text, DEFAULT_VOICE_SAMPLE);
    assert_eq!(requests[0].rate, 0.95);
    assert_eq!(requests[0].pitch, 1.05);
    assert_eq!(requests[0].voice.as_ref(), Some(&voice));

    // Unknown names speak nothing
    assert!(speaker.test_voice("tidak ada", Some("Halo")).await.is_none());
    settle(2000).await;
    assert_eq!(synth.requests().len(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_zero_resume_poll_still_completes() -> Result<()> {
    // Setup: Poll interval built directly, bypassing config validation
    let synth = Arc::new(FakeSynthesizer::indonesian());
    synth.script([Reply::Stalled(Duration::from_millis(300))]);
    let catalog = Arc::new(VoiceCatalog::new(
        synth.clone(),
        LanguagePreference::default(),
        Duration::from_millis(1000),
    ));
    let config = PlaybackConfig {
        resume_poll_interval: Duration::ZERO,
        ..PlaybackConfig::default()
    };
    let speaker = Speaker::new(synth.clone(), catalog, TextNormalizer::default(), config);

    let handle = speaker.speak("Halo dunia.", SpeakOptions::default());
    let status = tokio::time::timeout(Duration::from_secs(60), handle.finished()).await?;

    // Verify: Playback ran to completion and the stall poll still fired
    assert_eq!(status, PlaybackStatus::Completed);
    assert_eq!(synth.spoken(), vec!["Halo dunia.".to_string()]);
    assert!(synth.resume_count() > 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_voice_preview_speaks_sample_verbatim() -> Result<()> {
    let synth = Arc::new(FakeSynthesizer::indonesian());
    let speaker = speaker_for(&synth);
    let sample = format!("Catatan: buka contoh.com sekarang. {}", "Kalimat panjang sekali. ".repeat(10));

    speaker.test_voice("gadis", Some(&sample)).await.expect("voice should match");
    settle(2000).await;

    // Verify: One utterance, untouched by markup removal or chunking
    assert_eq!(synth.spoken(), vec![sample]);

    Ok(())
}
