use super::handlers;
use super::state::AppState;
use super::ws;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Multipart framing on top of the largest accepted audio payload
const BODY_LIMIT_OVERHEAD: usize = 64 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.ingest.max_bytes.saturating_add(BODY_LIMIT_OVERHEAD);

    Router::new()
        // Health and introspection
        .route("/health", get(handlers::health_check))
        .route("/languages", get(handlers::list_languages))
        .route("/status", get(handlers::get_status))
        // Listener/speaker sessions
        .route("/ws", get(ws::ws_handler))
        // Synthesized audio
        .route("/tts/:artifact_id", get(handlers::get_artifact))
        .route("/download/:artifact_id", get(handlers::get_artifact))
        // One-shot endpoints
        .route("/transcribe", post(handlers::transcribe))
        .route("/translate_tts", post(handlers::translate_tts))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
