//! Error taxonomy for the relay core.
//!
//! Each failure kind has its own type so callers can tell how far it is
//! allowed to propagate: ingest and transcription errors abort an utterance,
//! partition errors stay within one language, delivery failures stay within
//! one listener, and registry/artifact errors go back to the requester only.

use thiserror::Error;
use uuid::Uuid;

/// Cause of a failed call to an external engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceFailure {
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("engine returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed engine response: {0}")]
    Malformed(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("engine returned an empty result")]
    EmptyResult,
}

impl ServiceFailure {
    /// Collapse a reqwest error into a failure cause.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ServiceFailure::Timeout { secs: timeout_secs }
        } else if err.is_decode() {
            ServiceFailure::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            ServiceFailure::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            ServiceFailure::Transport(err.to_string())
        }
    }
}

/// The inbound audio could not be accepted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("audio payload is empty")]
    Empty,

    #[error("audio payload of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("malformed audio payload: {0}")]
    Malformed(String),

    #[error("speaker queue is full")]
    QueueFull,
}

/// Speech-to-text failed or produced nothing usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transcription failed: {cause}")]
pub struct TranscriptionError {
    #[source]
    pub cause: ServiceFailure,
}

impl From<ServiceFailure> for TranscriptionError {
    fn from(cause: ServiceFailure) -> Self {
        Self { cause }
    }
}

/// Why a pipeline run ended before distribution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunFailure {
    #[error("utterance is {age_ms}ms old, limit is {limit_ms}ms")]
    Stale { age_ms: u64, limit_ms: u64 },

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("translation to '{language}' failed: {cause}")]
pub struct TranslationError {
    pub language: String,
    #[source]
    pub cause: ServiceFailure,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("synthesis for '{language}' failed: {cause}")]
pub struct SynthesisError {
    pub language: String,
    #[source]
    pub cause: ServiceFailure,
}

/// Failure of one language partition. Never affects other partitions.
#[derive(Error, Debug)]
pub enum PartitionError {
    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("artifact storage failed: {0}")]
    Storage(#[from] StoreError),

    #[error("language '{0}' has no configured voice")]
    NoVoice(String),
}

/// Rejected registry update, returned only to the requesting connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("listener {0} is not registered")]
    UnknownListener(Uuid),

    #[error("language '{0}' is not supported")]
    UnsupportedLanguage(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("artifact {0} not found")]
pub struct ArtifactNotFound(pub String);

/// Failure to persist an artifact.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single listener could not be reached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFailure {
    #[error("listener {0} disconnected")]
    Disconnected(Uuid),

    #[error("listener {0} outbox is full")]
    Backpressure(Uuid),
}
