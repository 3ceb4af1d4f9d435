use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::engine::SpeechToText;
use crate::audio::UtteranceAudio;
use crate::error::{ServiceFailure, TranscriptionError};

/// Non-empty transcription output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
}

/// Uniform error semantics around a speech-to-text engine.
///
/// Exactly one engine call per utterance; no retries.
#[derive(Clone)]
pub struct TranscriptionGateway {
    engine: Arc<dyn SpeechToText>,
}

impl TranscriptionGateway {
    pub fn new(engine: Arc<dyn SpeechToText>) -> Self {
        Self { engine }
    }

    /// Transcribe and release the audio. Blank text is a failure.
    pub async fn transcribe(&self, audio: UtteranceAudio) -> Result<Transcript, TranscriptionError> {
        let started = Instant::now();
        let size = audio.len();

        let result = self.engine.transcribe(&audio).await;
        drop(audio);

        let raw = result.map_err(|cause| {
            warn!(engine = self.engine.name(), "Transcription call failed: {}", cause);
            TranscriptionError::from(cause)
        })?;

        let text = raw.trim();
        if text.is_empty() {
            return Err(ServiceFailure::EmptyResult.into());
        }

        debug!(
            engine = self.engine.name(),
            bytes = size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transcribed {} chars",
            text.len()
        );

        Ok(Transcript {
            text: text.to_string(),
        })
    }
}
