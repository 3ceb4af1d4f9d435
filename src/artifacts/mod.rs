//! TTL-scoped storage for synthesized audio
//!
//! Artifacts are written through an exclusive `ArtifactHandle`, become
//! readable by id once finalized, and are reclaimed by `sweep` after the
//! configured TTL. `spawn_sweeper` runs the sweep periodically.

mod store;
mod sweeper;

pub use store::{Artifact, ArtifactHandle, ArtifactRef, ArtifactStore};
pub use sweeper::spawn_sweeper;
