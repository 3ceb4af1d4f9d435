//! Listener session tracking
//!
//! This module owns every `ListenerSession`:
//! - `ConnectionRegistry` maps connection id -> language preference + outbox
//! - `Snapshot` is the point-in-time grouping used for one fan-out run
//! - `LanguageCatalog` knows which languages are supported and their voices
//! - `messages` defines the listener-facing websocket protocol

mod languages;
pub mod messages;
mod registry;

pub use languages::LanguageCatalog;
pub use messages::{ClientMessage, ErrorCode, ServerMessage, TranslationOutput};
pub use registry::{ConnectionRegistry, ListenerSession, Recipient, Snapshot};
