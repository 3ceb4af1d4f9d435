//! External engine contracts
//!
//! The relay core only talks to speech-to-text, translation and synthesis
//! engines through the traits in `engine`. `http` holds the reqwest-based
//! adapters used in production; tests plug in in-process fakes.

mod engine;
mod http;
mod transcription;

pub use engine::{Engines, SpeechToText, SynthesizedAudio, Synthesizer, Translator};
pub use http::{HttpSynthesizer, HttpTranscriber, HttpTranslator};
pub use transcription::{Transcript, TranscriptionGateway};
