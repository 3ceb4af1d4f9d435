use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::error::{
    ArtifactNotFound, IngestError, PartitionError, ServiceFailure, TranscriptionError,
};

/// Error returned by the HTTP handlers, rendered as `{ "error": ... }`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// The request was understood but produced nothing usable
    Unprocessable(String),
    /// An external engine failed
    BadGateway(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Unprocessable(msg)
            | ApiError::BadGateway(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(msg) => tracing::error!("Internal server error: {}", msg),
            ApiError::BadGateway(msg) => tracing::warn!("Upstream engine failed: {}", msg),
            other => tracing::debug!(status = status.as_u16(), "Request rejected: {}", other),
        }

        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.status().as_u16())
    }
}

impl std::error::Error for ApiError {}

impl From<ArtifactNotFound> for ApiError {
    fn from(err: ArtifactNotFound) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<TranscriptionError> for ApiError {
    fn from(err: TranscriptionError) -> Self {
        match err.cause {
            ServiceFailure::EmptyResult => ApiError::Unprocessable("transcript is empty".to_string()),
            _ => ApiError::BadGateway(err.to_string()),
        }
    }
}

impl From<PartitionError> for ApiError {
    fn from(err: PartitionError) -> Self {
        match err {
            PartitionError::NoVoice(_) => ApiError::BadRequest(err.to_string()),
            PartitionError::Storage(_) => ApiError::Internal(err.to_string()),
            PartitionError::Translation(_) | PartitionError::Synthesis(_) => {
                ApiError::BadGateway(err.to_string())
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
