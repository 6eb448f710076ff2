//! Handlers for the spreadsheet import workflow.
//!
//! Upload creates an in-memory session; the remaining endpoints drive it
//! through mapping, preview, selection and commit. The commit itself runs on
//! a spawned task and is observed through the progress endpoints.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use indexmap::IndexMap;
use rolodex_core::catalog::{catalog, FieldDef, FieldId};
use rolodex_core::commit::{CommitExecutor, CommitProgress};
use rolodex_core::error::CoreError;
use rolodex_core::mapping::{can_advance, missing_required, FieldMapping};
use rolodex_core::parser::{parse_upload, validate_upload};
use rolodex_core::preview::{ExistingRecordIndex, ImportRow, PreviewSummary};
use rolodex_core::report::ImportSummary;
use rolodex_core::session::{ImportSession, ImportStep};
use rolodex_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ── Views ────────────────────────────────────────────────────────────

/// Full session state as returned by most endpoints.
#[derive(Debug, Serialize)]
pub struct ImportSessionView {
    pub id: Uuid,
    pub file_name: String,
    pub step: ImportStep,
    pub headers: Vec<String>,
    pub row_count: usize,
    pub mapping: FieldMapping,
    pub can_advance: bool,
    pub missing_required: Option<FieldId>,
    pub preview: Option<PreviewView>,
    pub progress: CommitProgress,
    pub summary: Option<ImportSummary>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Serialize)]
pub struct PreviewView {
    pub summary: PreviewSummary,
    pub rows: Vec<ImportRow>,
}

impl ImportSessionView {
    fn new(id: Uuid, session: &ImportSession) -> Self {
        let preview = (!session.rows().is_empty()).then(|| PreviewView {
            summary: session.preview_summary(),
            rows: session.rows().to_vec(),
        });
        Self {
            id,
            file_name: session.file_name().to_string(),
            step: session.step(),
            headers: session.headers().to_vec(),
            row_count: session.row_count(),
            mapping: session.mapping().clone(),
            can_advance: can_advance(session.mapping()),
            missing_required: missing_required(session.mapping()),
            preview,
            progress: session.progress_snapshot(),
            summary: session.summary().cloned(),
            created_at: session.created_at(),
            updated_at: session.updated_at(),
        }
    }
}

/// Result of toggling a single row.
#[derive(Debug, Serialize)]
pub struct RowSelection {
    pub index: usize,
    pub selected: bool,
    pub summary: PreviewSummary,
}

// ── Request bodies ───────────────────────────────────────────────────

/// Body for `PUT /imports/{id}/mapping`. Headers left out become unmapped.
#[derive(Debug, Deserialize)]
pub struct ReplaceMappingRequest {
    pub mapping: IndexMap<String, Option<FieldId>>,
}

/// Body for `PATCH /imports/{id}/mapping`.
#[derive(Debug, Deserialize)]
pub struct AssignColumnRequest {
    pub header: String,
    pub field: Option<FieldId>,
}

/// Body for row selection endpoints.
#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub selected: bool,
}

// ── Catalog ──────────────────────────────────────────────────────────

/// GET /api/v1/imports/catalog
pub async fn get_catalog() -> Json<DataResponse<Vec<FieldDef>>> {
    Json(DataResponse { data: catalog() })
}

// ── Upload ───────────────────────────────────────────────────────────

/// POST /api/v1/imports
///
/// Accept a single multipart `file` field, parse it and open a session with
/// an auto-detected mapping. Nothing is created when parsing fails.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<ImportSessionView>>)> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("File name is missing".to_string()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        upload = Some((file_name, data.to_vec()));
        break;
    }

    let (file_name, bytes) = upload
        .ok_or_else(|| AppError::BadRequest("Missing multipart field 'file'".to_string()))?;

    if bytes.len() > state.config.max_upload_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "File exceeds the {} byte limit",
            state.config.max_upload_bytes
        )));
    }

    let kind = validate_upload(&file_name, bytes.len())?;
    let sheet = parse_upload(bytes, kind).await?;
    let session = ImportSession::new(&file_name, sheet);
    let id = state.sessions.insert(session).await;

    let handle = state.sessions.get(id).await?;
    let session = handle.lock().await;
    tracing::info!(
        session_id = %id,
        file_name = %file_name,
        rows = session.row_count(),
        mapped = session.mapping().mapped().count(),
        "Import session created",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: ImportSessionView::new(id, &session),
        }),
    ))
}

// ── Session ──────────────────────────────────────────────────────────

/// GET /api/v1/imports/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<ImportSessionView>>> {
    let handle = state.sessions.get(id).await?;
    let session = handle.lock().await;
    Ok(Json(DataResponse {
        data: ImportSessionView::new(id, &session),
    }))
}

/// DELETE /api/v1/imports/{id}
pub async fn discard_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.sessions.remove(id).await?;
    tracing::info!(session_id = %id, "Import session discarded");
    Ok(StatusCode::NO_CONTENT)
}

// ── Mapping ──────────────────────────────────────────────────────────

/// PUT /api/v1/imports/{id}/mapping
///
/// Replace the whole mapping. Rejects unknown headers and fields mapped
/// from two headers.
pub async fn replace_mapping(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ReplaceMappingRequest>,
) -> AppResult<Json<DataResponse<ImportSessionView>>> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.lock().await;

    let mapping = FieldMapping::from_pairs(
        session.headers(),
        input.mapping.iter().map(|(h, f)| (h.as_str(), *f)),
    )?;
    session.replace_mapping(mapping)?;

    Ok(Json(DataResponse {
        data: ImportSessionView::new(id, &session),
    }))
}

/// PATCH /api/v1/imports/{id}/mapping
///
/// Point one header at a field. A header previously holding that field is
/// unmapped.
pub async fn assign_column(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<AssignColumnRequest>,
) -> AppResult<Json<DataResponse<ImportSessionView>>> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.lock().await;
    session.assign(&input.header, input.field)?;

    Ok(Json(DataResponse {
        data: ImportSessionView::new(id, &session),
    }))
}

// ── Preview & selection ──────────────────────────────────────────────

/// POST /api/v1/imports/{id}/preview
///
/// Validate every row and flag those whose email, CPF or CNPJ already exist.
pub async fn build_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<ImportSessionView>>> {
    let handle = state.sessions.get(id).await?;
    let keys = state
        .store
        .snapshot_existing_keys()
        .await
        .map_err(CoreError::from)?;
    let index = ExistingRecordIndex::from_keys(keys);

    let mut session = handle.lock().await;
    let summary = session.build_preview(&index)?;
    tracing::info!(
        session_id = %id,
        total = summary.total,
        errors = summary.error,
        warnings = summary.warning,
        "Import preview built",
    );

    Ok(Json(DataResponse {
        data: ImportSessionView::new(id, &session),
    }))
}

/// PATCH /api/v1/imports/{id}/rows/{index}
pub async fn toggle_row(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(input): Json<SelectionRequest>,
) -> AppResult<Json<DataResponse<RowSelection>>> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.lock().await;
    let selected = session.toggle_row(index, input.selected)?;

    Ok(Json(DataResponse {
        data: RowSelection {
            index,
            selected,
            summary: session.preview_summary(),
        },
    }))
}

/// POST /api/v1/imports/{id}/rows/select-all
///
/// Rows in error stay deselected.
pub async fn select_all(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<SelectionRequest>,
) -> AppResult<Json<DataResponse<PreviewSummary>>> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.lock().await;
    let summary = session.toggle_all(input.selected)?;
    Ok(Json(DataResponse { data: summary }))
}

/// POST /api/v1/imports/{id}/reset
pub async fn reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<ImportSessionView>>> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.lock().await;
    session.reset()?;

    Ok(Json(DataResponse {
        data: ImportSessionView::new(id, &session),
    }))
}

// ── Commit ───────────────────────────────────────────────────────────

/// POST /api/v1/imports/{id}/commit
///
/// Start writing the selected rows. Returns immediately with the initial
/// progress snapshot; the run continues on a background task and cannot be
/// cancelled.
pub async fn start_commit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<DataResponse<CommitProgress>>)> {
    let handle = state.sessions.get(id).await?;
    let (rows, progress) = {
        let mut session = handle.lock().await;
        let rows = session.begin_commit()?;
        (rows, session.progress())
    };
    tracing::info!(session_id = %id, selected = rows.len(), "Import commit requested");

    let executor = CommitExecutor::new(Arc::clone(&state.store), Arc::clone(&progress));
    let session_handle = Arc::clone(&handle);
    tokio::spawn(
        async move {
            let outcomes = executor.run(rows).await;
            let mut session = session_handle.lock().await;
            if let Err(e) = session.finish_commit(&outcomes) {
                tracing::error!(error = %e, "Failed to record import summary");
            }
        }
        .instrument(tracing::info_span!("import_commit", session_id = %id)),
    );

    let snapshot = progress.borrow().clone();
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: snapshot })))
}

/// GET /api/v1/imports/{id}/progress
pub async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<CommitProgress>>> {
    let handle = state.sessions.get(id).await?;
    let session = handle.lock().await;
    Ok(Json(DataResponse {
        data: session.progress_snapshot(),
    }))
}

/// GET /api/v1/imports/{id}/report
///
/// Final summary. 409 until the commit has finished.
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DataResponse<ImportSummary>>> {
    let handle = state.sessions.get(id).await?;
    let session = handle.lock().await;
    let summary = session.summary().cloned().ok_or_else(|| {
        CoreError::Conflict(format!(
            "Import is in step '{}', no report yet",
            session.step()
        ))
    })?;
    Ok(Json(DataResponse { data: summary }))
}
