/// API route handlers.
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use tubedrop_shared::link::is_youtube_url;
use tubedrop_shared::models::{Job, JobId, VideoInfo};
use tubedrop_shared::FormatSelection;

use crate::error::ApiError;
use crate::AppState;

// ====== REQUEST PARSING ======

/// Unwrap a JSON object body; anything else is rejected the same way.
fn json_object(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    match payload {
        Ok(Json(value)) if value.is_object() => Ok(value),
        Ok(_) => Err(ApiError::Input("JSON válido requerido".into())),
        Err(rejection) => {
            info!("Rejected request body: {}", rejection);
            Err(ApiError::Input("JSON válido requerido".into()))
        }
    }
}

/// Render a scalar field as a string; `null` counts as absent.
fn field_string(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Extract and validate the `url` field.
fn required_url(body: &Value) -> Result<String, ApiError> {
    let url = field_string(body, "url")
        .ok_or_else(|| ApiError::Input("Campo \"url\" requerido".into()))?;
    let url = url.trim().to_string();
    if url.is_empty() {
        return Err(ApiError::Input("URL no puede estar vacía".into()));
    }
    if !is_youtube_url(&url) {
        return Err(ApiError::Validation("URL debe ser de YouTube".into()));
    }
    Ok(url)
}

fn parse_job_id(raw: &str, not_found: ApiError) -> Result<JobId, ApiError> {
    raw.parse().map_err(|_| not_found)
}

// ====== VIDEO INFO ======

/// POST /api/video-info
pub async fn video_info(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<VideoInfo>, ApiError> {
    let body = json_object(payload)?;
    let url = required_url(&body)?;

    let metadata = state.extractor.probe(&url).await.map_err(|e| {
        warn!("Video info failed for {}: {}", url, e);
        ApiError::Extraction(e)
    })?;

    Ok(Json(VideoInfo::from(metadata)))
}

// ====== DOWNLOADS ======

/// POST /api/download - start a background download
pub async fn start_download(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = json_object(payload)?;
    let url = required_url(&body)?;
    let quality = field_string(&body, "quality");
    let audio_only = truthy(body.get("audio_only"));

    let selection = FormatSelection::from_request(quality.as_deref(), audio_only);
    let job_id = state.pool.submit(url, selection).await;

    Ok(Json(serde_json::json!({
        "download_id": job_id,
        "message": "Descarga iniciada",
    })))
}

/// GET /api/progress/:id
pub async fn progress(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let job_id = parse_job_id(&raw_id, ApiError::JobNotFound)?;
    state
        .store
        .get(&job_id)
        .await
        .map(Json)
        .ok_or(ApiError::JobNotFound)
}

/// GET /api/download-file/:id - stream the finished file once
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_job_id(&raw_id, ApiError::FileNotFound)?;
    let delivered = state.delivery.open(&job_id).await?;

    let disposition = content_disposition(&delivered.filename);
    let guard = delivered.guard;
    // the guard lives as long as the body; dropping it schedules cleanup
    let stream = ReaderStream::new(delivered.file).map(move |chunk| {
        let _guard = &guard;
        chunk
    });

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, delivered.len.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    ))
}

/// Attachment header with an ASCII fallback and an RFC 5987 UTF-8 name.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .map(|c| if c == '"' || c == '\\' { '_' } else { c })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

/// GET /api/downloads - every tracked job
pub async fn list_downloads(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store.list_all().await)
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "jobs": state.store.len().await,
        "running": state.pool.running(),
        "max_concurrent": state.pool.max_concurrent(),
    }))
}
