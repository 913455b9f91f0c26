//! Per-file conversion pipeline
//!
//! Drives one input document through: engine invocation, artifact
//! discovery, image placement, optional PDF post-processing, and pruning
//! of formats the caller did not ask for.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::engine::{ConversionEngine, ConversionRequest, EngineError};
use crate::session::{ArtifactKind, ConversionOptions, OutputFormat, SessionPaths};

pub mod locate;
pub mod render;

use locate::DiscoveredArtifacts;

/// Successful pipeline result for one input file.
#[derive(Debug)]
pub struct ConvertedFile {
    /// Output kind to artifact path, at most one per kind.
    pub outputs: BTreeMap<ArtifactKind, PathBuf>,
    /// Extracted images, already under the session's `images/` directory.
    pub images: Vec<PathBuf>,
    /// Extracted text, for inline responses.
    pub text: String,
}

/// Convert one input file into the session's output tree.
pub async fn convert_file(
    engine: &dyn ConversionEngine,
    config: &Config,
    paths: &SessionPaths,
    input: &Path,
    options: &ConversionOptions,
) -> Result<ConvertedFile, EngineError> {
    let output_dir = paths.metadata();
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    engine
        .convert(&ConversionRequest {
            input: input.to_path_buf(),
            output_dir: output_dir.clone(),
            options: options.clone(),
        })
        .await?;

    let discovered = locate::discover_artifacts(&output_dir, &stem, options.output_format);
    let text = extract_text(&discovered);
    let images = place_images(paths, &output_dir, &stem, input, options.extract_images);

    let mut outputs = BTreeMap::new();
    if let Some(path) = &discovered.markdown {
        outputs.insert(ArtifactKind::Markdown, path.clone());
    }
    if let Some(path) = &discovered.json {
        outputs.insert(ArtifactKind::Json, path.clone());
    }
    if let Some(path) = &discovered.html {
        outputs.insert(ArtifactKind::Html, path.clone());
    }
    if let Some(path) = &discovered.metadata {
        outputs.insert(ArtifactKind::Metadata, path.clone());
    }

    if options.output_format == OutputFormat::Pdf {
        match render_pdf(config, &discovered, &output_dir, &stem).await {
            Ok(pdf) => {
                outputs.insert(ArtifactKind::Pdf, pdf);
            }
            Err(e) => {
                tracing::warn!(input = %input.display(), error = %e, "PDF post-processing failed");
            }
        }
    }

    prune_unrequested(&mut outputs, &output_dir, &stem, options.output_format);

    let requested = options.output_format.artifact_kind();
    if !outputs.contains_key(&requested) {
        let placeholder = locate::synthesize_placeholder(&output_dir, &stem, options.output_format)?;
        tracing::warn!(
            input = %input.display(),
            placeholder = %placeholder.display(),
            "Engine produced no artifact in the requested format"
        );
        outputs.insert(requested, placeholder);
    }

    Ok(ConvertedFile {
        outputs,
        images,
        text,
    })
}

/// Read extracted text from the markdown artifact, falling back to the
/// `text` field of the JSON artifact.
fn extract_text(discovered: &DiscoveredArtifacts) -> String {
    if let Some(md) = &discovered.markdown {
        if let Ok(text) = std::fs::read_to_string(md) {
            return text;
        }
    }
    if let Some(json) = &discovered.json {
        if let Ok(raw) = std::fs::read_to_string(json) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
                if let Some(text) = value.get("text").and_then(|t| t.as_str()) {
                    return text.to_string();
                }
            }
        }
    }
    String::new()
}

/// Move located images under the session's `images/` directory, or delete
/// them when image extraction was declined. The input document is never
/// deleted.
fn place_images(
    paths: &SessionPaths,
    output_dir: &Path,
    stem: &str,
    input: &Path,
    extract_images: bool,
) -> Vec<PathBuf> {
    let located = locate::locate_images(output_dir, stem, input);
    if located.is_empty() {
        return Vec::new();
    }

    if !extract_images {
        for image in &located {
            if image == input {
                continue;
            }
            if let Err(e) = std::fs::remove_file(image) {
                tracing::warn!(image = %image.display(), error = %e, "Failed to delete unrequested image");
            }
        }
        return Vec::new();
    }

    let images_dir = paths.images();
    let mut placed = Vec::with_capacity(located.len());
    for image in located {
        let Some(name) = image.file_name() else {
            continue;
        };
        let dest = images_dir.join(name);
        match std::fs::rename(&image, &dest) {
            Ok(()) => placed.push(dest),
            Err(e) => {
                // leave it where the engine put it; still report it
                tracing::warn!(image = %image.display(), error = %e, "Failed to move extracted image");
                placed.push(image);
            }
        }
    }
    placed
}

/// Produce the PDF artifact from whichever text artifact exists.
async fn render_pdf(
    config: &Config,
    discovered: &DiscoveredArtifacts,
    output_dir: &Path,
    stem: &str,
) -> Result<PathBuf, EngineError> {
    if let Some(html) = &discovered.html {
        return render::html_to_pdf(&config.weasyprint_bin, html, output_dir, stem).await;
    }
    if let Some(md) = &discovered.markdown {
        let html = render::markdown_to_html(&config.pandoc_bin, md, output_dir, stem).await?;
        return render::html_to_pdf(&config.weasyprint_bin, &html, output_dir, stem).await;
    }
    Err(EngineError::Failed(
        "no markdown or HTML artifact to render".to_string(),
    ))
}

/// Delete artifacts of kinds the caller did not request, plus any
/// intermediates of the PDF render step. Sidecar metadata is kept.
fn prune_unrequested(
    outputs: &mut BTreeMap<ArtifactKind, PathBuf>,
    output_dir: &Path,
    stem: &str,
    format: OutputFormat,
) {
    let requested = format.artifact_kind();
    for kind in [ArtifactKind::Markdown, ArtifactKind::Json, ArtifactKind::Html] {
        if kind == requested {
            continue;
        }
        if let Some(path) = outputs.remove(&kind) {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to delete unrequested artifact");
            }
        }
    }

    if format == OutputFormat::Pdf {
        for name in [render::temp_html_name(stem), render::STYLESHEET_NAME.to_string()] {
            let path = output_dir.join(name);
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to delete render intermediate");
                }
            }
        }
    }
}
