//! Ficha API endpoints
//!
//! Provides REST API over the composites of the workspace:
//! - List and inspect fichas
//! - Correct extracted fields by hand
//! - Run OCR on one ficha or all of them
//! - Save everything to storage

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::busy;
use super::workspace::BatchAccepted;
use crate::error::{AppError, FichaError, Result};
use crate::extraction::{extract_all, extract_ficha};
use crate::persist::{save_all, SaveReport};
use crate::progress::Operation;
use crate::state::AppState;
use crate::workspace::{BandKind, CompositeSummary};

#[derive(Serialize)]
pub struct FichaListResponse {
    pub fichas: Vec<CompositeSummary>,
    pub total: usize,
}

/// Manual correction of extracted fields
#[derive(Debug, Deserialize)]
pub struct FichaEdit {
    pub nome: Option<String>,
    pub registro: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractQuery {
    pub language: Option<String>,
}

/// Create the fichas router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_fichas))
        .route("/extract", post(start_extract_all))
        .route("/save", post(save_fichas))
        .route("/:id", get(get_ficha).patch(edit_ficha))
        .route("/:id/bands/:band", get(get_band))
        .route("/:id/extract", post(extract_one))
}

async fn list_fichas(State(state): State<AppState>) -> Json<FichaListResponse> {
    let workspace = state.workspace().read().await;
    let fichas: Vec<CompositeSummary> = workspace.composites().iter().map(|c| c.summary()).collect();
    let total = fichas.len();

    Json(FichaListResponse { fichas, total })
}

async fn get_ficha(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CompositeSummary>> {
    let workspace = state.workspace().read().await;
    let composite = workspace.composite(&id).ok_or_else(|| not_found(&id))?;

    Ok(Json(composite.summary()))
}

/// Overwrite `nome` and/or `registro`; saved fichas are read-only, and
/// nothing can be edited while a batch runs
async fn edit_ficha(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(edit): Json<FichaEdit>,
) -> Result<Json<CompositeSummary>> {
    let mut workspace = state.edit_workspace().await.map_err(busy)?;

    let composite = workspace.composite(&id).ok_or_else(|| not_found(&id))?;
    if composite.is_saved() {
        return Err(AppError::BadRequest(format!("Ficha '{}' is already saved", id)));
    }

    let summary = workspace
        .update_composite(&id, |composite| {
            if let Some(nome) = edit.nome {
                composite.extracted_name = Some(nome);
            }
            if let Some(registro) = edit.registro {
                composite.extracted_registration = Some(registro);
            }
            composite.summary()
        })
        .ok_or_else(|| not_found(&id))?;

    tracing::debug!(ficha_id = %id, "Fields edited");
    Ok(Json(summary))
}

/// One band of a ficha as JPEG
async fn get_band(
    State(state): State<AppState>,
    Path((id, band)): Path<(String, BandKind)>,
) -> Result<impl IntoResponse> {
    let workspace = state.workspace().read().await;
    let composite = workspace.composite(&id).ok_or_else(|| not_found(&id))?;

    Ok((
        [(header::CONTENT_TYPE, "image/jpeg")],
        composite.band(band).clone(),
    ))
}

/// OCR one ficha and wait for the result
async fn extract_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ExtractQuery>,
) -> Result<Json<CompositeSummary>> {
    // Held until the text is written back, so the workspace cannot be
    // re-split underneath this ficha
    let _guard = state
        .operations()
        .try_acquire(Operation::Extract)
        .map_err(busy)?;

    if state.workspace().read().await.composite(&id).is_none() {
        return Err(not_found(&id));
    }

    let summary = extract_ficha(
        state.workspace(),
        state.ocr(),
        state.notifier(),
        &id,
        query.language.as_deref(),
    )
    .await?;

    Ok(Json(summary))
}

/// OCR every ficha in the background
async fn start_extract_all(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<BatchAccepted>)> {
    let guard = state
        .operations()
        .try_acquire(Operation::Extract)
        .map_err(busy)?;

    let total = state
        .workspace()
        .read()
        .await
        .composites()
        .iter()
        .filter(|c| !c.is_saved())
        .count();
    if total == 0 {
        return Err(FichaError::Validation("No fichas to extract".to_string()).into());
    }

    let task_state = state.clone();
    tokio::spawn(async move {
        let _guard = guard;
        let batch_size = task_state.config().pipeline.ocr_batch_size;
        extract_all(
            task_state.workspace(),
            task_state.ocr(),
            task_state.progress(),
            task_state.notifier(),
            batch_size,
        )
        .await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchAccepted {
            operation: Operation::Extract,
            total,
        }),
    ))
}

/// Save all fichas and report per-record outcomes
async fn save_fichas(State(state): State<AppState>) -> Result<Json<SaveReport>> {
    let _guard = state
        .operations()
        .try_acquire(Operation::Save)
        .map_err(busy)?;

    let report = save_all(state.workspace(), &state.save_context()).await;
    Ok(Json(report))
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Ficha '{}' not found", id))
}
