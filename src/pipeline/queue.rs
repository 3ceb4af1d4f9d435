use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::coordinator::FanoutCoordinator;
use crate::audio::Utterance;
use crate::error::IngestError;

/// Serializes utterances from one speaker stream.
///
/// A single worker task runs each utterance to completion before starting
/// the next, so every listener receives results in submission order.
pub struct SpeakerQueue {
    tx: mpsc::Sender<Utterance>,
    worker: JoinHandle<usize>,
}

impl SpeakerQueue {
    pub fn spawn(coordinator: Arc<FanoutCoordinator>, speaker_id: Uuid, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Utterance>(capacity.max(1));

        let worker = tokio::spawn(async move {
            info!(speaker_id = %speaker_id, "Speaker queue started");
            let mut processed = 0usize;

            while let Some(utterance) = rx.recv().await {
                coordinator.process(utterance).await;
                processed += 1;
            }

            info!(speaker_id = %speaker_id, processed, "Speaker queue drained");
            processed
        });

        Self { tx, worker }
    }

    /// Enqueue without waiting. Fails when the queue is full or stopped.
    pub fn submit(&self, utterance: Utterance) -> Result<Uuid, IngestError> {
        let id = utterance.id;
        self.tx.try_send(utterance).map_err(|e| {
            warn!(utterance_id = %id, "Utterance rejected: {}", e);
            IngestError::QueueFull
        })?;
        Ok(id)
    }

    /// Stop accepting utterances and wait for the pending ones to finish.
    /// Returns how many utterances the queue processed in total.
    pub async fn drain(self) -> usize {
        drop(self.tx);
        match self.worker.await {
            Ok(processed) => processed,
            Err(e) => {
                warn!("Speaker queue worker failed: {}", e);
                0
            }
        }
    }
}
