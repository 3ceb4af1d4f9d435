use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::audio::UtteranceAudio;
use crate::error::ServiceFailure;

/// Speech-to-text engine
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe one utterance. Returns the raw text, which may be blank.
    async fn transcribe(&self, audio: &UtteranceAudio) -> Result<String, ServiceFailure>;

    /// Engine name for logging
    fn name(&self) -> &str;
}

/// Text translation engine. Source language is auto-detected.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ServiceFailure>;

    fn name(&self) -> &str;
}

/// Audio produced by a synthesis engine
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Bytes,
    /// Content type reported by the engine, if any
    pub mime_type: Option<String>,
}

/// Speech synthesis engine
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        voice: &str,
    ) -> Result<SynthesizedAudio, ServiceFailure>;

    fn name(&self) -> &str;
}

/// The three external engines the pipeline drives
#[derive(Clone)]
pub struct Engines {
    pub transcriber: Arc<dyn SpeechToText>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn Synthesizer>,
}
