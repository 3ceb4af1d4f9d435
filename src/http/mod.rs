//! HTTP API and websocket server
//!
//! - GET /ws - Listener/speaker session (JSON frames)
//! - GET /tts/:id - Synthesized audio artifact (alias: /download/:id)
//! - POST /transcribe - One-shot transcription of an uploaded file
//! - POST /translate_tts - One-shot translation + synthesis
//! - GET /languages - Supported languages
//! - GET /status - Connected listeners and live artifacts
//! - GET /health - Health check

mod error;
mod handlers;
mod routes;
mod state;
mod ws;

pub use error::{ApiError, ApiResult};
pub use handlers::{
    LanguagesResponse, StatusResponse, TranscribeResponse, TranslateTtsRequest,
    TranslateTtsResponse,
};
pub use routes::create_router;
pub use state::AppState;
