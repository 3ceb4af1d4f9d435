pub mod artifacts;
pub mod audio;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod pipeline;
pub mod session;

pub use artifacts::{spawn_sweeper, Artifact, ArtifactRef, ArtifactStore};
pub use audio::{AudioEncoding, Utterance, UtteranceAudio};
pub use config::Config;
pub use gateway::{Engines, SpeechToText, Synthesizer, TranscriptionGateway, Translator};
pub use http::{create_router, AppState};
pub use pipeline::{DeliveryBroadcaster, FanoutCoordinator, PipelineOptions, RunReport, SpeakerQueue};
pub use session::{ClientMessage, ConnectionRegistry, LanguageCatalog, ServerMessage};
