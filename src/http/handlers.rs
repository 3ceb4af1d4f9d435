use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::audio::{AudioEncoding, Utterance};
use axum::{
    body::Body,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    Form,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TranslateTtsRequest {
    pub text: Option<String>,
    /// Target language, "en" when omitted
    pub lang: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateTtsResponse {
    pub translated_text: String,
    pub artifact_address: String,
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LanguagesResponse {
    pub default: String,
    pub supported: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub listeners: usize,
    pub listeners_by_language: BTreeMap<String, usize>,
    pub artifacts: usize,
    pub uptime_secs: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /languages
pub async fn list_languages(State(state): State<AppState>) -> Json<LanguagesResponse> {
    let catalog = state.registry().catalog();
    Json(LanguagesResponse {
        default: catalog.default_language().to_string(),
        supported: catalog.supported().map(str::to_string).collect(),
    })
}

/// GET /status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let listeners_by_language = state.registry().counts_by_language();
    Json(StatusResponse {
        listeners: listeners_by_language.values().sum(),
        listeners_by_language,
        artifacts: state.artifacts().len().await,
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}

/// GET /tts/:artifact_id (also served as /download/:artifact_id)
pub async fn get_artifact(
    State(state): State<AppState>,
    Path(artifact_id): Path<String>,
) -> ApiResult<Response> {
    let artifact = state.artifacts().read(&artifact_id).await?;
    debug!(artifact_id = %artifact.id, bytes = artifact.bytes.len(), "Serving artifact");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.mime_type),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        Body::from(artifact.bytes),
    )
        .into_response())
}

/// POST /transcribe
/// Multipart upload with a `file` field; replies `{ text }`
pub async fn transcribe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<TranscribeResponse>> {
    let mut upload: Option<(Bytes, AudioEncoding)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let encoding = match field.file_name() {
            Some("") => return Err(ApiError::BadRequest("Empty filename".to_string())),
            Some(name) => AudioEncoding::from_file_name(name),
            None => AudioEncoding::Unknown,
        };
        let encoding = match (encoding, field.content_type()) {
            (AudioEncoding::Unknown, Some(mime)) => AudioEncoding::from_declared(mime),
            (encoding, _) => encoding,
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        upload = Some((bytes, encoding));
        break;
    }

    let Some((bytes, encoding)) = upload else {
        return Err(ApiError::BadRequest("No file uploaded".to_string()));
    };

    let utterance = Utterance::ingest(bytes, encoding, &state.ingest)?;
    info!(utterance_id = %utterance.id, "One-shot transcription requested");

    let transcript = state
        .coordinator
        .transcription()
        .transcribe(utterance.audio)
        .await?;

    Ok(Json(TranscribeResponse {
        text: transcript.text,
    }))
}

/// POST /translate_tts
/// Accepts JSON, url-encoded or multipart `{ text, lang }`
pub async fn translate_tts(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<Json<TranslateTtsResponse>> {
    let req = read_translate_request(request).await?;

    let text = req
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No text provided".to_string()))?;

    let catalog = state.registry().catalog();
    let requested = req.lang.as_deref().unwrap_or(catalog.default_language());
    let language = catalog
        .canonical(requested)
        .ok_or_else(|| ApiError::BadRequest(format!("Unsupported language '{}'", requested)))?;

    info!(language = %language, chars = text.len(), "One-shot translate+synthesize requested");

    let result = state
        .coordinator
        .translate_and_synthesize(text, &language)
        .await?;

    Ok(Json(TranslateTtsResponse {
        artifact_address: state.coordinator.broadcaster().artifact_address(&result),
        translated_text: result.translated_text,
        language: result.language,
    }))
}

async fn read_translate_request(request: Request) -> ApiResult<TranslateTtsRequest> {
    let content_type = content_type(request.headers());

    if content_type.starts_with("application/json") {
        let Json(req) = Json::<TranslateTtsRequest>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        return Ok(req);
    }

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        let mut req = TranslateTtsRequest {
            text: None,
            lang: None,
        };
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            match name.as_str() {
                "text" => req.text = Some(value),
                "lang" => req.lang = Some(value),
                _ => {}
            }
        }
        return Ok(req);
    }

    let Form(req) = Form::<TranslateTtsRequest>::from_request(request, &())
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(req)
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}
