use futures::future::join_all;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::broadcaster::DeliveryBroadcaster;
use super::types::{PartitionReport, RunReport, Stage, TranslationResult};
use crate::artifacts::ArtifactStore;
use crate::audio::Utterance;
use crate::error::{PartitionError, RunFailure, SynthesisError, TranslationError};
use crate::gateway::{Engines, Synthesizer, TranscriptionGateway, Translator};
use crate::session::{ConnectionRegistry, Recipient};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Used when the synthesis engine does not report an audio content type
    pub artifact_mime_type: String,
    pub public_base_url: Option<String>,
    /// Utterances older than this when their run starts are dropped
    pub max_utterance_age: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            artifact_mime_type: "audio/mpeg".to_string(),
            public_base_url: None,
            max_utterance_age: None,
        }
    }
}

/// Tracks the stage of one run and logs each transition
struct RunState {
    utterance_id: Uuid,
    stage: Stage,
}

impl RunState {
    fn new(utterance_id: Uuid) -> Self {
        Self {
            utterance_id,
            stage: Stage::Received,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal transition {} -> {}",
            self.stage,
            next
        );
        debug!(utterance_id = %self.utterance_id, "{} -> {}", self.stage, next);
        self.stage = next;
    }
}

/// Drives one utterance from audio to per-language deliveries.
///
/// External calls per utterance: one transcription, then one translation and
/// one synthesis per distinct language in the snapshot.
pub struct FanoutCoordinator {
    registry: ConnectionRegistry,
    transcription: TranscriptionGateway,
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn Synthesizer>,
    artifacts: ArtifactStore,
    broadcaster: DeliveryBroadcaster,
    artifact_mime_type: String,
    max_utterance_age: Option<Duration>,
}

impl FanoutCoordinator {
    pub fn new(
        engines: Engines,
        registry: ConnectionRegistry,
        artifacts: ArtifactStore,
        options: PipelineOptions,
    ) -> Self {
        Self {
            registry,
            transcription: TranscriptionGateway::new(engines.transcriber),
            translator: engines.translator,
            synthesizer: engines.synthesizer,
            artifacts,
            broadcaster: DeliveryBroadcaster::new(options.public_base_url),
            artifact_mime_type: options.artifact_mime_type,
            max_utterance_age: options.max_utterance_age,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn transcription(&self) -> &TranscriptionGateway {
        &self.transcription
    }

    pub fn broadcaster(&self) -> &DeliveryBroadcaster {
        &self.broadcaster
    }

    /// Run one utterance to completion. Never fails as a whole: stale audio and
    /// transcription failures end the run early, partition failures are
    /// recorded per language.
    pub async fn process(&self, utterance: Utterance) -> RunReport {
        let started = Instant::now();
        let Utterance {
            id: utterance_id,
            received_at,
            audio,
            ..
        } = utterance;

        let mut run = RunState::new(utterance_id);
        info!(
            utterance_id = %utterance_id,
            received_at = %received_at,
            bytes = audio.len(),
            "Processing utterance"
        );

        if let Some(limit) = self.max_utterance_age {
            let age = (Utc::now() - received_at).to_std().unwrap_or_default();
            if age > limit {
                let failure = RunFailure::Stale {
                    age_ms: age.as_millis() as u64,
                    limit_ms: limit.as_millis() as u64,
                };
                warn!(utterance_id = %utterance_id, "Dropping utterance: {}", failure);
                drop(audio);
                run.advance(Stage::Failed);
                return RunReport {
                    utterance_id,
                    stage: run.stage,
                    transcript: None,
                    failure: Some(failure),
                    partitions: Vec::new(),
                };
            }
        }

        run.advance(Stage::Transcribing);
        // The gateway takes ownership of the audio and releases it on return
        let transcript = match self.transcription.transcribe(audio).await {
            Ok(transcript) => transcript,
            Err(e) => {
                error!(utterance_id = %utterance_id, "Utterance aborted: {}", e);
                run.advance(Stage::Failed);
                return RunReport {
                    utterance_id,
                    stage: run.stage,
                    transcript: None,
                    failure: Some(e.into()),
                    partitions: Vec::new(),
                };
            }
        };
        run.advance(Stage::Transcribed);

        let snapshot = self.registry.snapshot();
        run.advance(Stage::Distributing);

        if snapshot.is_empty() {
            info!(utterance_id = %utterance_id, "No listeners connected, nothing to distribute");
        }

        let partitions = join_all(snapshot.into_partitions().into_iter().map(
            |(language, recipients)| {
                self.run_partition(utterance_id, &transcript.text, language, recipients)
            },
        ))
        .await;

        run.advance(Stage::Completed);

        let failed = partitions.iter().filter(|p| !p.is_success()).count();
        info!(
            utterance_id = %utterance_id,
            languages = partitions.len(),
            failed_languages = failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Utterance completed"
        );

        RunReport {
            utterance_id,
            stage: run.stage,
            transcript: Some(transcript.text),
            failure: None,
            partitions,
        }
    }

    /// Translate and synthesize `text` into one language, storing the audio
    /// as an artifact.
    pub async fn translate_and_synthesize(
        &self,
        text: &str,
        language: &str,
    ) -> Result<TranslationResult, PartitionError> {
        let catalog = self.registry.catalog();
        let voice = catalog
            .voice_for(language)
            .ok_or_else(|| PartitionError::NoVoice(language.to_string()))?;

        let translated_text = self
            .translator
            .translate(text, language)
            .await
            .map_err(|cause| TranslationError {
                language: language.to_string(),
                cause,
            })?;

        let audio = self
            .synthesizer
            .synthesize(&translated_text, language, voice)
            .await
            .map_err(|cause| SynthesisError {
                language: language.to_string(),
                cause,
            })?;

        let mime_type = audio
            .mime_type
            .filter(|mime| mime.starts_with("audio/"))
            .unwrap_or_else(|| self.artifact_mime_type.clone());

        let artifact = self.artifacts.store(&mime_type, &audio.bytes).await?;

        Ok(TranslationResult {
            language: language.to_string(),
            translated_text,
            artifact,
        })
    }

    async fn run_partition(
        &self,
        utterance_id: Uuid,
        original_text: &str,
        language: String,
        recipients: Vec<Recipient>,
    ) -> PartitionReport {
        let listeners = recipients.len();

        let outcome = match self.translate_and_synthesize(original_text, &language).await {
            Ok(result) => {
                let delivery =
                    self.broadcaster
                        .deliver(utterance_id, original_text, &result, &recipients);
                Ok((result, delivery))
            }
            Err(e) => {
                warn!(
                    utterance_id = %utterance_id,
                    language = %language,
                    listeners,
                    "Partition failed, its listeners receive nothing: {}",
                    e
                );
                Err(e)
            }
        };

        PartitionReport {
            language,
            listeners,
            outcome,
        }
    }
}
