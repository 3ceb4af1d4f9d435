use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::artifacts::ArtifactRef;
use crate::error::{DeliveryFailure, PartitionError, RunFailure};

/// Lifecycle of one utterance through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Transcribing,
    Failed,
    Transcribed,
    Distributing,
    Completed,
}

impl Stage {
    pub fn can_advance_to(self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Stage::Received, Stage::Transcribing)
                | (Stage::Received, Stage::Failed)
                | (Stage::Transcribing, Stage::Failed)
                | (Stage::Transcribing, Stage::Transcribed)
                | (Stage::Transcribed, Stage::Distributing)
                | (Stage::Distributing, Stage::Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Failed | Stage::Completed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Transcribing => "transcribing",
            Stage::Failed => "failed",
            Stage::Transcribed => "transcribed",
            Stage::Distributing => "distributing",
            Stage::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Translation + synthesis output for one language of one utterance
#[derive(Debug, Clone)]
pub struct TranslationResult {
    pub language: String,
    pub translated_text: String,
    pub artifact: ArtifactRef,
}

/// Outcome of handing one result to a partition
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub delivered: Vec<Uuid>,
    pub failed: Vec<DeliveryFailure>,
}

#[derive(Debug)]
pub struct PartitionReport {
    pub language: String,
    pub listeners: usize,
    pub outcome: Result<(TranslationResult, DeliveryReport), PartitionError>,
}

impl PartitionReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Summary of one pipeline run
#[derive(Debug)]
pub struct RunReport {
    pub utterance_id: Uuid,
    pub stage: Stage,
    pub transcript: Option<String>,
    pub failure: Option<RunFailure>,
    pub partitions: Vec<PartitionReport>,
}

impl RunReport {
    pub fn partition(&self, language: &str) -> Option<&PartitionReport> {
        self.partitions.iter().find(|p| p.language == language)
    }

    pub fn delivered_count(&self) -> usize {
        self.partitions
            .iter()
            .filter_map(|p| p.outcome.as_ref().ok())
            .map(|(_, delivery)| delivery.delivered.len())
            .sum()
    }
}
