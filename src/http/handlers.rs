//! Endpoint handlers and error mapping.

use super::AppState;
use crate::error::{ServiceError, StoreError};
use crate::models::{DatasetReport, DatasetResponse};
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::PathRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use tracing::{debug, error};

/// JSON error body `{"error": "..."}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Dataset not found")
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Invalid or missing token")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Ingest(e) => ApiError::bad_request(e.to_string()),
            ServiceError::Store(StoreError::NotFound(_)) => ApiError::not_found(),
            other => {
                error!("Request failed: {}", other);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

/// Dataset ids are integers; anything else names no dataset.
fn dataset_id(path: Result<Path<u64>, PathRejection>) -> Result<u64, ApiError> {
    path.map(|Path(id)| id).map_err(|rejection| {
        debug!("Unparseable dataset id: {}", rejection.body_text());
        ApiError::not_found()
    })
}

/// Run a store-touching closure off the async executor.
async fn run_blocking<T, F>(f: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Task(e.to_string()))?
}

/// `POST /api/upload/`: multipart form with a `file` field.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<DatasetResponse>), ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        debug!("Upload rejected: {}", rejection.body_text());
        ApiError::bad_request("No file was submitted")
    })?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) = upload.ok_or_else(|| ApiError::bad_request("No file was submitted"))?;

    let service = state.service.clone();
    let response = run_blocking(move || service.upload(file_name.as_deref(), &bytes)).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /api/history/`
pub async fn history(State(state): State<AppState>) -> Result<Json<Vec<DatasetResponse>>, ApiError> {
    let service = state.service.clone();
    let history = run_blocking(move || service.history()).await?;
    Ok(Json(history))
}

/// `GET /api/datasets/{id}/`
pub async fn dataset(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<DatasetReport>, ApiError> {
    let id = dataset_id(path)?;
    let service = state.service.clone();
    let report = run_blocking(move || service.get_by_id(id)).await?;
    Ok(Json(report))
}

/// `GET /api/report/{id}/`: rendered report as a download.
pub async fn report(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Response, ApiError> {
    let id = dataset_id(path)?;
    let service = state.service.clone();
    let renderer = Arc::clone(&state.renderer);
    let rendered = run_blocking(move || service.render_report(id, renderer.as_ref())).await?;

    let disposition = format!("attachment; filename=\"{}\"", rendered.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, rendered.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        rendered.bytes,
    )
        .into_response())
}
