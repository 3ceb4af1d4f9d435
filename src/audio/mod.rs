pub mod encoding;
pub mod utterance;

pub use encoding::AudioEncoding;
pub use utterance::{probe_container, ProbeInfo, Utterance, UtteranceAudio};
