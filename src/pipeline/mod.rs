//! Fan-out pipeline
//!
//! One utterance flows through:
//! `Received -> Transcribing -> (Failed | Transcribed) -> Distributing -> Completed`
//!
//! - `FanoutCoordinator` transcribes once, snapshots the registry and runs
//!   translate + synthesize once per distinct listener language
//! - `DeliveryBroadcaster` hands each language result to that partition
//! - `SpeakerQueue` serializes utterances from one speaker stream

mod broadcaster;
mod coordinator;
mod queue;
mod types;

pub use broadcaster::DeliveryBroadcaster;
pub use coordinator::{FanoutCoordinator, PipelineOptions};
pub use queue::SpeakerQueue;
pub use types::{DeliveryReport, PartitionReport, RunReport, Stage, TranslationResult};
