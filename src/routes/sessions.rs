//! Session API routes
//!
//! The background-processing variant of the API:
//! - POST /api/upload - save files, schedule a batch, return a session id
//! - GET /api/sessions - list known sessions
//! - GET /api/sessions/:id/status - session record as JSON
//! - GET /api/sessions/:id/download/:filename - stream one artifact
//! - GET /api/sessions/:id/download-all - zip of every artifact
//! - DELETE /api/sessions/:id - remove directory and record
//! - POST /api/cleanup - run the retention sweep immediately

use std::ffi::OsStr;
use std::path::{Path as FsPath, PathBuf};

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::engine::ConversionEngine;
use crate::error::{AppError, Result};
use crate::jobs::{BatchJob, SavedFile};
use crate::retention::{self, RetentionReport};
use crate::session::{ConversionSettings, Session, SessionKind, SessionPaths, SessionStore};
use crate::state::AppState;

use super::form;

/// Create the session router, nested under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/sessions", get(list_sessions))
        .route("/sessions/:session_id/status", get(session_status))
        .route("/sessions/:session_id/download/:filename", get(download_file))
        .route("/sessions/:session_id/download-all", get(download_all))
        .route("/sessions/:session_id", delete(delete_session))
        .route("/cleanup", post(run_cleanup))
}

// ============================================================================
// Upload
// ============================================================================

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    session_id: Uuid,
    message: String,
    settings: ConversionSettings,
}

/// POST /api/upload
///
/// Validates everything synchronously, persists the files, then schedules
/// the batch; the response returns before conversion begins.
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let payload = form::parse_upload(&mut multipart, state.config()).await?;

    if payload.files.is_empty() {
        return Err(AppError::InvalidRequest("No files uploaded".to_string()));
    }
    for file in &payload.files {
        if !state.engine().accepts(FsPath::new(&file.filename)) {
            return Err(AppError::UnsupportedFileType(file.filename.clone()));
        }
    }

    let id = Uuid::new_v4();
    let session = Session::new(
        id,
        SessionKind::Session,
        payload.files.len(),
        payload.options.redacted_settings(),
    );
    let paths = SessionPaths::new(&state.config().output_root, &session.dir_name());
    paths.create_all()?;

    let mut saved = Vec::with_capacity(payload.files.len());
    for file in &payload.files {
        let dest = paths.documents().join(&file.filename);
        tokio::fs::write(&dest, &file.data).await?;
        tracing::info!(
            session_id = %id,
            file = %file.filename,
            bytes = file.data.len(),
            "Saved uploaded file"
        );
        saved.push(SavedFile {
            filename: file.filename.clone(),
            path: dest,
            size: file.data.len() as u64,
        });
    }

    let settings = session.settings.clone();
    let total = saved.len();
    state.store().set(session).await;
    state
        .jobs()
        .spawn_batch(
            state.store().clone(),
            state.engine().clone(),
            state.config().clone(),
            BatchJob {
                session_id: id,
                paths,
                files: saved,
                options: payload.options,
            },
        )
        .await;

    tracing::info!(session_id = %id, files = total, "Started processing session");

    Ok(Json(UploadResponse {
        success: true,
        session_id: id,
        message: format!("Processing {total} file(s) with session {id}"),
        settings,
    }))
}

// ============================================================================
// Status and listing
// ============================================================================

/// GET /api/sessions/:id/status
async fn session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Session>> {
    let id = parse_session_id(&session_id)?;
    state
        .store()
        .get(id)
        .await
        .map(Json)
        .ok_or(AppError::SessionNotFound(session_id))
}

#[derive(Serialize)]
struct SessionListResponse {
    sessions: Vec<Uuid>,
    total: usize,
}

/// GET /api/sessions
async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    let sessions: Vec<Uuid> = state.store().list().await.into_iter().map(|s| s.id).collect();
    let total = sessions.len();
    Json(SessionListResponse { sessions, total })
}

// ============================================================================
// Downloads
// ============================================================================

/// GET /api/sessions/:id/download/:filename
///
/// The artifact may sit anywhere under the session tree; direct children
/// are preferred, then a recursive search. Unknown names are 404, never a
/// server error.
async fn download_file(
    State(state): State<AppState>,
    Path((session_id, filename)): Path<(String, String)>,
) -> Result<Response> {
    let id = parse_session_id(&session_id)?;
    let dir = resolve_session_dir(&state, id)
        .await
        .ok_or(AppError::SessionNotFound(session_id))?;

    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(AppError::InvalidRequest(format!(
            "Invalid filename: '{filename}'"
        )));
    }

    let direct = dir.join(&filename);
    let path = if direct.is_file() {
        Some(direct)
    } else {
        find_file(&dir, &filename)
    };
    let path = path.ok_or_else(|| AppError::FileNotFound(filename.clone()))?;

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| AppError::FileNotFound(filename.clone()))?;
    let content_type = mime_guess::from_path(&path).first_or_octet_stream();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// GET /api/sessions/:id/download-all
async fn download_all(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response> {
    let id = parse_session_id(&session_id)?;
    let dir = resolve_session_dir(&state, id)
        .await
        .ok_or(AppError::SessionNotFound(session_id))?;

    let archive = build_zip(&dir)?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"session_{id}.zip\""),
        )
        .body(Body::from(archive))
        .map_err(|e| AppError::Internal(e.to_string()))
}

// ============================================================================
// Deletion and cleanup
// ============================================================================

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

/// DELETE /api/sessions/:id
async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let id = parse_session_id(&session_id)?;
    let record = state.store().delete(id).await;

    let dir = match &record {
        Some(session) => Some(state.config().output_root.join(session.dir_name())),
        None => probe_session_dir(&state.config().output_root, id),
    };

    let mut removed_dir = false;
    if let Some(dir) = dir {
        if dir.is_dir() {
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to remove {}: {e}", dir.display())))?;
            removed_dir = true;
        }
    }

    if record.is_none() && !removed_dir {
        return Err(AppError::SessionNotFound(session_id));
    }

    tracing::info!(session_id = %id, "Cleaned up session");
    Ok(Json(MessageResponse {
        message: format!("Session {id} cleaned up successfully"),
    }))
}

#[derive(Serialize)]
struct CleanupResponse {
    success: bool,
    message: String,
    #[serde(flatten)]
    report: RetentionReport,
}

/// POST /api/cleanup
async fn run_cleanup(State(state): State<AppState>) -> Json<CleanupResponse> {
    let report = retention::enforce(
        &state.config().output_root,
        state.config().keep_recent,
        state.store().as_ref(),
    )
    .await;

    Json(CleanupResponse {
        success: true,
        message: "Output files cleaned up successfully".to_string(),
        report,
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_session_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::SessionNotFound(raw.to_string()))
}

/// Resolve a session's directory: prefer the in-memory record, fall back
/// to probing both directory prefixes (records are lost on restart, the
/// directories are not).
async fn resolve_session_dir(state: &AppState, id: Uuid) -> Option<PathBuf> {
    if let Some(session) = state.store().get(id).await {
        let dir = state.config().output_root.join(session.dir_name());
        if dir.is_dir() {
            return Some(dir);
        }
    }
    probe_session_dir(&state.config().output_root, id).filter(|dir| dir.is_dir())
}

fn probe_session_dir(root: &FsPath, id: Uuid) -> Option<PathBuf> {
    [SessionKind::Session, SessionKind::Convert]
        .into_iter()
        .map(|kind| root.join(format!("{}_{id}", kind.prefix())))
        .find(|dir| dir.is_dir())
}

/// Depth-first search for a file name under the session tree.
fn find_file(dir: &FsPath, name: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && path.file_name() == Some(OsStr::new(name)) {
            return Some(path);
        }
        if path.is_dir() {
            subdirs.push(path);
        }
    }
    subdirs.iter().find_map(|sub| find_file(sub, name))
}

/// Zip every file under the session directory, preserving relative paths.
fn build_zip(dir: &FsPath) -> Result<Vec<u8>> {
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries = std::fs::read_dir(&current)
            .map_err(|e| AppError::Internal(format!("Failed to read {}: {e}", current.display())))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let name = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            writer
                .start_file(name, options)
                .map_err(|e| AppError::Internal(e.to_string()))?;
            let mut file = std::fs::File::open(&path)
                .map_err(|e| AppError::Internal(e.to_string()))?;
            std::io::copy(&mut file, &mut writer)
                .map_err(|e| AppError::Internal(e.to_string()))?;
        }
    }

    let cursor = writer
        .finish()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(cursor.into_inner())
}
