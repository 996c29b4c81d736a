/// HTTP error mapping. Every error renders as `{"error": "..."}`.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use tubedrop_shared::errors::{DeliveryError, ExtractionError};

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, empty or malformed request data.
    #[error("{0}")]
    Input(String),

    /// Well-formed URL that this service does not handle.
    #[error("{0}")]
    Validation(String),

    #[error("Error al obtener información del video: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("ID de descarga no encontrado")]
    JobNotFound,

    #[error("Archivo no disponible")]
    FileNotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Input(_) | ApiError::Validation(_) | ApiError::Extraction(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::JobNotFound | ApiError::FileNotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl From<DeliveryError> for ApiError {
    fn from(_: DeliveryError) -> Self {
        ApiError::FileNotFound
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
