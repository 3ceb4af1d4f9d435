use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::artifacts::ArtifactStore;
use crate::config::{Config, DeliveryConfig, IngestConfig};
use crate::error::StoreError;
use crate::gateway::Engines;
use crate::pipeline::{FanoutCoordinator, PipelineOptions};
use crate::session::{ConnectionRegistry, LanguageCatalog};

/// Shared application state for HTTP and websocket handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<FanoutCoordinator>,
    pub ingest: IngestConfig,
    pub delivery: DeliveryConfig,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        coordinator: Arc<FanoutCoordinator>,
        ingest: IngestConfig,
        delivery: DeliveryConfig,
    ) -> Self {
        Self {
            coordinator,
            ingest,
            delivery,
            started_at: Utc::now(),
        }
    }

    /// Open the artifact store and wire registry, engines and pipeline
    pub async fn from_config(config: &Config, engines: Engines) -> Result<Self, StoreError> {
        let artifacts = ArtifactStore::from_config(&config.artifacts).await?;
        let registry = ConnectionRegistry::new(LanguageCatalog::from_config(&config.languages));

        let options = PipelineOptions {
            artifact_mime_type: config.artifacts.mime_type.clone(),
            public_base_url: config.service.public_base_url.clone(),
            max_utterance_age: config.ingest.max_age(),
        };
        let coordinator = FanoutCoordinator::new(engines, registry, artifacts, options);

        Ok(Self::new(
            Arc::new(coordinator),
            config.ingest.clone(),
            config.delivery.clone(),
        ))
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        self.coordinator.registry()
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        self.coordinator.artifacts()
    }
}
