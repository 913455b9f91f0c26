//! Capability and status routes

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::engine::ConversionEngine;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/formats", get(formats))
}

/// GET /
async fn root() -> Json<Value> {
    Json(json!({
        "message": "DocMill Server",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "High-quality document conversion server using Marker OCR",
        "supported_formats": [
            "PDF", "JPEG", "PNG", "WebP", "TIFF", "BMP",
            "DOCX", "PPTX", "XLSX", "EPUB", "MOBI", "HTML",
        ],
        "output_formats": ["markdown", "json", "html", "pdf"],
        "status": "ready",
    }))
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<Value> {
    let engine_available = state.engine().is_available().await;
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now(),
        "engine": state.engine().name(),
        "engine_available": engine_available,
    }))
}

/// GET /api/formats
async fn formats() -> Json<Value> {
    Json(json!({
        "input_formats": {
            "pdf": "PDF documents (recommended)",
            "images": ["JPEG", "PNG", "WebP", "TIFF", "BMP"],
            "office": ["DOCX", "PPTX", "XLSX"],
            "ebooks": ["EPUB", "MOBI"],
            "web": ["HTML"],
        },
        "output_formats": {
            "markdown": "Clean markdown with preserved structure",
            "json": "Structured JSON with metadata",
            "html": "HTML with styling and formatting",
            "pdf": "Print-ready PDF rendered from the converted document",
        },
        "llm_features": {
            "layout_enhancement": "Improved layout detection",
            "table_processing": "Better table recognition",
            "equation_processing": "Enhanced mathematical content",
            "image_descriptions": "AI-generated image descriptions",
        },
    }))
}
