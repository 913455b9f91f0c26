//! Synchronous conversion route
//!
//! POST /convert takes exactly one file and converts it inside the
//! request, returning the full result inline. Session bookkeeping is the
//! same as the background variant, with a `convert_` directory prefix.

use std::path::PathBuf;

use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::convert::convert_file;
use crate::engine::ConversionEngine;
use crate::error::{AppError, Result};
use crate::retention;
use crate::session::{
    ArtifactKind, FileResult, Session, SessionKind, SessionPaths, SessionStore,
};
use crate::state::AppState;

use super::form;

pub fn router() -> Router<AppState> {
    Router::new().route("/convert", post(convert_document))
}

#[derive(Serialize)]
struct ConvertResponse {
    success: bool,
    session_id: Uuid,
    filename: String,
    output_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    markdown_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pdf_file: Option<PathBuf>,
    images_extracted: usize,
    text: String,
}

/// POST /convert
async fn convert_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ConvertResponse>> {
    let payload = form::parse_upload(&mut multipart, state.config()).await?;

    if payload.files.len() != 1 {
        return Err(AppError::InvalidRequest(format!(
            "Expected exactly one file, got {}",
            payload.files.len()
        )));
    }
    let file = &payload.files[0];
    if !state.engine().accepts(std::path::Path::new(&file.filename)) {
        return Err(AppError::UnsupportedFileType(file.filename.clone()));
    }

    let id = Uuid::new_v4();
    let session = Session::new(
        id,
        SessionKind::Convert,
        1,
        payload.options.redacted_settings(),
    );
    let paths = SessionPaths::new(&state.config().output_root, &session.dir_name());
    paths.create_all()?;

    let input = paths.documents().join(&file.filename);
    tokio::fs::write(&input, &file.data).await?;
    state.store().set(session).await;

    tracing::info!(session_id = %id, file = %file.filename, "Converting document");

    let outcome = convert_file(
        state.engine().as_ref(),
        state.config(),
        &paths,
        &input,
        &payload.options,
    )
    .await;

    match outcome {
        Ok(converted) => {
            if let Some(mut session) = state.store().get(id).await {
                session.record_file(FileResult::completed(
                    file.filename.as_str(),
                    converted.outputs.clone(),
                    converted.images.len(),
                ));
                session.mark_completed();
                state.store().set(session).await;
            }

            retention::enforce(
                &state.config().output_root,
                state.config().keep_recent,
                state.store().as_ref(),
            )
            .await;

            Ok(Json(ConvertResponse {
                success: true,
                session_id: id,
                filename: file.filename.clone(),
                output_format: payload.options.output_format.as_str().to_string(),
                markdown_file: converted.outputs.get(&ArtifactKind::Markdown).cloned(),
                json_file: converted.outputs.get(&ArtifactKind::Json).cloned(),
                html_file: converted.outputs.get(&ArtifactKind::Html).cloned(),
                pdf_file: converted.outputs.get(&ArtifactKind::Pdf).cloned(),
                images_extracted: converted.images.len(),
                text: converted.text,
            }))
        }
        Err(e) => {
            tracing::error!(session_id = %id, file = %file.filename, error = %e, "Conversion failed");
            if let Some(mut session) = state.store().get(id).await {
                session.record_file(FileResult::failed(file.filename.as_str(), e.to_string()));
                session.mark_failed(e.to_string());
                state.store().set(session).await;
            }
            Err(AppError::Engine(e))
        }
    }
}
