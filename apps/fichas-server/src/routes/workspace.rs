//! Workspace API endpoints
//!
//! Uploads, settings, the split step and progress polling.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::busy;
use crate::error::{AppError, Result};
use crate::ingest::{normalize_all, RawUpload};
use crate::pairing;
use crate::progress::{format_duration, Operation, ProcessingStats};
use crate::state::AppState;
use crate::workspace::{
    Classification, CompositeSummary, ImageSummary, ScanType, WorkspaceSettings, WorkspaceStage,
};

/// Full workspace view
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceView {
    pub stage: WorkspaceStage,
    pub settings: WorkspaceSettings,
    pub images: Vec<ImageSummary>,
    pub fichas: Vec<CompositeSummary>,
    pub progress: Option<ProcessingStats>,
    pub busy: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_split_duration: Option<String>,
    pub pending_notifications: usize,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub images: Vec<ImageSummary>,
    pub total: usize,
}

/// Partial settings update
#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    #[serde(alias = "firstScanType")]
    pub first_scan_type: Option<ScanType>,
    #[serde(alias = "classPolegarEsq")]
    pub class_polegar_esq: Option<String>,
    #[serde(alias = "classPolegarDir")]
    pub class_polegar_dir: Option<String>,
}

/// Returned when a background batch is started
#[derive(Serialize)]
pub struct BatchAccepted {
    pub operation: Operation,
    pub total: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub busy: Option<Operation>,
    pub stats: Option<ProcessingStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<String>,
}

/// Create the workspace router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_workspace).delete(reset_workspace))
        .route("/settings", put(update_settings))
        .route("/images", post(upload_images).delete(clear_images))
        .route("/images/:id", get(get_image).delete(delete_image))
        .route("/split", post(start_split))
        .route("/progress", get(get_progress))
        // Scans are large
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024))
}

async fn get_workspace(State(state): State<AppState>) -> Json<WorkspaceView> {
    let workspace = state.workspace().read().await;

    Json(WorkspaceView {
        stage: workspace.stage(),
        settings: workspace.settings().clone(),
        images: workspace.images().iter().map(|i| i.summary()).collect(),
        fichas: workspace.composites().iter().map(|c| c.summary()).collect(),
        progress: state.progress().snapshot(),
        busy: state.operations().current(),
        last_split_duration: workspace.last_split_duration().map(format_duration),
        pending_notifications: state.notifier().len(),
    })
}

/// Drop uploads and fichas; refused while a batch is running
async fn reset_workspace(State(state): State<AppState>) -> Result<StatusCode> {
    state.edit_workspace().await.map_err(busy)?.reset();
    state.notifier().info("Workspace cleared");
    Ok(StatusCode::NO_CONTENT)
}

async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<WorkspaceSettings>> {
    let mut workspace = state.edit_workspace().await.map_err(busy)?;

    if let Some(scan_type) = update.first_scan_type {
        workspace.set_first_scan_type(scan_type);
    }
    if update.class_polegar_esq.is_some() || update.class_polegar_dir.is_some() {
        let current = workspace.settings().classification.clone();
        workspace.set_classification(Classification {
            class_polegar_esq: update.class_polegar_esq.unwrap_or(current.class_polegar_esq),
            class_polegar_dir: update.class_polegar_dir.unwrap_or(current.class_polegar_dir),
        });
    }

    Ok(Json(workspace.settings().clone()))
}

/// Add scans; every part carrying a file is taken, in order
async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read upload: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());

        if file_name.is_none() && !matches!(name.as_str(), "file" | "files" | "images") {
            tracing::debug!("Ignoring multipart field '{}'", name);
            continue;
        }

        let data = field.bytes().await.map_err(|e| {
            tracing::error!("Failed to read file data: {}", e);
            AppError::BadRequest(format!("Failed to read file data: {}", e))
        })?;

        uploads.push(RawUpload::new(data, file_name, content_type));
    }

    if uploads.is_empty() {
        return Err(AppError::BadRequest(
            "No files provided. Use field name 'file'".to_string(),
        ));
    }

    let files = normalize_all(uploads)?;
    let images = state.edit_workspace().await.map_err(busy)?.add_uploads(files);

    tracing::info!("Received {} uploads", images.len());
    let total = images.len();
    Ok((StatusCode::CREATED, Json(UploadResponse { images, total })))
}

async fn clear_images(State(state): State<AppState>) -> Result<StatusCode> {
    state.edit_workspace().await.map_err(busy)?.clear_images();
    Ok(StatusCode::NO_CONTENT)
}

/// Raw bytes of one upload
async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let workspace = state.workspace().read().await;
    let image = workspace
        .image(&id)
        .ok_or_else(|| AppError::NotFound(format!("Image '{}' not found", id)))?;

    Ok((
        [(header::CONTENT_TYPE, image.mime_type.clone())],
        Bytes::clone(&image.data),
    ))
}

async fn delete_image(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    if state.edit_workspace().await.map_err(busy)?.remove_image(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Image '{}' not found", id)))
    }
}

/// Validate the uploads, then split them in the background
async fn start_split(State(state): State<AppState>) -> Result<(StatusCode, Json<BatchAccepted>)> {
    let guard = state
        .operations()
        .try_acquire(Operation::Split)
        .map_err(busy)?;

    let images = pairing::snapshot_for_split(&*state.workspace().read().await)?;
    let pairs = images.len() / 2;

    let task_state = state.clone();
    tokio::spawn(async move {
        let _guard = guard;
        let quality = task_state.config().pipeline.band_jpeg_quality;
        if let Err(e) = pairing::run_split(
            images,
            task_state.workspace(),
            task_state.progress(),
            task_state.notifier(),
            quality,
        )
        .await
        {
            tracing::debug!("Split task ended with error: {}", e);
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchAccepted {
            operation: Operation::Split,
            total: pairs,
        }),
    ))
}

async fn get_progress(State(state): State<AppState>) -> Json<ProgressView> {
    let stats = state.progress().snapshot();

    Json(ProgressView {
        busy: state.operations().current(),
        percent: stats.as_ref().map(|s| s.percent()),
        elapsed: stats.as_ref().map(|s| format_duration(s.elapsed)),
        remaining: stats
            .as_ref()
            .map(|s| format_duration(s.estimated_time_remaining)),
        stats,
    })
}
