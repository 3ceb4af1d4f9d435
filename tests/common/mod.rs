// Shared fixtures for integration tests: scripted in-process engines and
// helpers to wire them into a coordinator backed by a temporary store.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;
use voice_relay::artifacts::ArtifactStore;
use voice_relay::audio::{AudioEncoding, Utterance, UtteranceAudio};
use voice_relay::config::IngestConfig;
use voice_relay::error::ServiceFailure;
use voice_relay::gateway::{Engines, SpeechToText, SynthesizedAudio, Synthesizer, Translator};
use voice_relay::pipeline::{FanoutCoordinator, PipelineOptions};
use voice_relay::session::{ConnectionRegistry, LanguageCatalog, ServerMessage};

/// "Transcribes" by reading the audio bytes as UTF-8 text
#[derive(Default)]
pub struct FakeTranscriber {
    pub calls: AtomicUsize,
    pub fail_with: Mutex<Option<ServiceFailure>>,
}

#[async_trait]
impl SpeechToText for FakeTranscriber {
    async fn transcribe(&self, audio: &UtteranceAudio) -> Result<String, ServiceFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.fail_with.lock().clone() {
            return Err(failure);
        }
        Ok(String::from_utf8_lossy(&audio.bytes).into_owned())
    }

    fn name(&self) -> &str {
        "fake-stt"
    }
}

/// Translates to "<lang>:<text>"; texts starting with "slow" take a while
#[derive(Default)]
pub struct FakeTranslator {
    pub calls: Mutex<Vec<(String, String)>>,
    pub fail_for: Mutex<Vec<String>>,
    pub slow_delay: Duration,
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ServiceFailure> {
        self.calls
            .lock()
            .push((text.to_string(), target_language.to_string()));

        if text.starts_with("slow") {
            tokio::time::sleep(self.slow_delay).await;
        }

        if self.fail_for.lock().iter().any(|l| l == target_language) {
            return Err(ServiceFailure::Status {
                status: 503,
                body: "translator unavailable".to_string(),
            });
        }

        Ok(format!("{}:{}", target_language, text))
    }

    fn name(&self) -> &str {
        "fake-translate"
    }
}

/// Synthesizes "audio[<text>]" as the audio bytes
#[derive(Default)]
pub struct FakeSynthesizer {
    pub calls: Mutex<Vec<(String, String, String)>>,
    pub fail_for: Mutex<Vec<String>>,
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        voice: &str,
    ) -> Result<SynthesizedAudio, ServiceFailure> {
        self.calls
            .lock()
            .push((text.to_string(), language.to_string(), voice.to_string()));

        if self.fail_for.lock().iter().any(|l| l == language) {
            return Err(ServiceFailure::Timeout { secs: 1 });
        }

        Ok(SynthesizedAudio {
            bytes: Bytes::from(format!("audio[{}]", text)),
            mime_type: Some("audio/mpeg".to_string()),
        })
    }

    fn name(&self) -> &str {
        "fake-tts"
    }
}

pub struct Fakes {
    pub transcriber: Arc<FakeTranscriber>,
    pub translator: Arc<FakeTranslator>,
    pub synthesizer: Arc<FakeSynthesizer>,
}

impl Fakes {
    pub fn new() -> Self {
        Self::with_slow_delay(Duration::from_millis(100))
    }

    pub fn with_slow_delay(slow_delay: Duration) -> Self {
        Self {
            transcriber: Arc::new(FakeTranscriber::default()),
            translator: Arc::new(FakeTranslator {
                slow_delay,
                ..FakeTranslator::default()
            }),
            synthesizer: Arc::new(FakeSynthesizer::default()),
        }
    }

    pub fn engines(&self) -> Engines {
        Engines {
            transcriber: self.transcriber.clone(),
            translator: self.translator.clone(),
            synthesizer: self.synthesizer.clone(),
        }
    }

    pub fn transcribe_calls(&self) -> usize {
        self.transcriber.calls.load(Ordering::SeqCst)
    }

    /// (text, language) pairs, sorted for order-independent assertions
    pub fn translate_calls(&self) -> Vec<(String, String)> {
        let mut calls = self.translator.calls.lock().clone();
        calls.sort();
        calls
    }

    pub fn synthesize_calls(&self) -> Vec<(String, String, String)> {
        let mut calls = self.synthesizer.calls.lock().clone();
        calls.sort();
        calls
    }
}

pub fn catalog() -> LanguageCatalog {
    let voices: BTreeMap<String, String> = [("en", "alloy"), ("es", "nova"), ("fr", "shimmer"), ("de", "onyx")]
        .into_iter()
        .map(|(code, voice)| (code.to_string(), voice.to_string()))
        .collect();
    LanguageCatalog::new("en", voices)
}

/// Ingest limits that skip container probing so plain text can stand in for audio
pub fn text_ingest() -> IngestConfig {
    IngestConfig {
        max_bytes: 1024 * 1024,
        probe_audio: false,
        max_age_secs: 0,
    }
}

pub fn utterance(text: &str) -> Utterance {
    Utterance::ingest(
        Bytes::from(text.to_string()),
        AudioEncoding::Unknown,
        &text_ingest(),
    )
    .expect("text utterance should ingest")
}

pub struct Harness {
    pub coordinator: Arc<FanoutCoordinator>,
    pub fakes: Fakes,
    pub dir: TempDir,
}

impl Harness {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_fakes(Fakes::new()).await
    }

    pub async fn with_fakes(fakes: Fakes) -> anyhow::Result<Self> {
        Self::build(fakes, catalog(), PipelineOptions::default()).await
    }

    pub async fn build(
        fakes: Fakes,
        catalog: LanguageCatalog,
        options: PipelineOptions,
    ) -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let store = ArtifactStore::open(
            dir.path(),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        )
        .await?;
        let registry = ConnectionRegistry::new(catalog);
        let coordinator = FanoutCoordinator::new(fakes.engines(), registry, store, options);

        Ok(Self {
            coordinator: Arc::new(coordinator),
            fakes,
            dir,
        })
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        self.coordinator.registry()
    }

    /// Register a listener and return its id plus the receiving end of its outbox
    pub fn listener(&self, language: &str) -> (Uuid, mpsc::Receiver<ServerMessage>) {
        self.listener_with_capacity(language, 16)
    }

    pub fn listener_with_capacity(
        &self,
        language: &str,
        capacity: usize,
    ) -> (Uuid, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = Uuid::new_v4();
        self.registry().join(id, Some(language), tx);
        (id, rx)
    }
}

/// Everything currently queued in an outbox
pub fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}
