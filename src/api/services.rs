use std::collections::HashMap;

use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{
    models::{DownloadAccepted, DownloadPayload, HealthResponse},
    state::AppState,
    utils::{content_disposition, parse_content_type},
};
use crate::api::error::ApiError;

/// Download submission endpoint (POST /download)
///
/// Accepts a single `{url, format?, resolution?}` object or an array of
/// them. The whole batch is validated before anything is started; on
/// success every item has already been seeded as `pending` by the time the
/// 202 is returned.
pub async fn submit_downloads(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;

    // Rejects application/jsonp and friends
    parse_content_type(content_type)?;

    // Decompression already handled by RequestDecompressionLayer
    let body_bytes = read_body(body, state.config.server.max_payload_bytes).await?;

    let payload: DownloadPayload = serde_json::from_slice(&body_bytes)?;
    let receipt = state.dispatcher.dispatch(payload.into_requests())?;

    let response = DownloadAccepted {
        message: receipt.message,
        file_ids: receipt.file_ids,
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Reads the request body, failing once it grows past `limit` bytes.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, ApiError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(ApiError::PayloadTooLarge { limit })
        }
        Err(err) => Err(ApiError::InvalidPayload(format!(
            "failed to read request body: {err}"
        ))),
    }
}

/// Job status endpoint (GET /status/{file_id})
pub async fn get_status(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.query.status(&file_id)?;
    Ok((StatusCode::OK, Json(view)))
}

/// Artifact endpoint (GET /files/{file_id})
///
/// Streams the already-open file handle, so a file deleted after the lookup
/// still streams in full and a file deleted before it is a 404.
pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let artifact = state.query.open_artifact(&file_id).await?;
    debug!(%file_id, filename = %artifact.filename, bytes = artifact.len, "Serving artifact");

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(artifact.content_type),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(artifact.len));
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(&artifact.filename),
    );

    let body = Body::from_stream(ReaderStream::new(artifact.file));
    Ok((StatusCode::OK, headers, body).into_response())
}

/// Health check endpoint (GET /health)
///
/// Reports the process as healthy whenever it can answer, together with the
/// job counters.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = HashMap::new();
    components.insert("api".to_string(), "healthy".to_string());
    components.insert("ledger".to_string(), "healthy".to_string());

    let download_dir = if state.query.download_dir().is_dir() {
        "healthy"
    } else {
        "unhealthy"
    };
    components.insert("download_dir".to_string(), download_dir.to_string());

    let all_healthy = components.values().all(|status| status == "healthy");
    let (overall_status, status_code) = if all_healthy {
        ("healthy", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
        jobs: state.metrics.snapshot(),
    };

    (status_code, Json(response))
}
