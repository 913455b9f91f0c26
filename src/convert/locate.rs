//! Output locator
//!
//! The Marker CLI may place its output directly in the output directory,
//! in a per-document subdirectory named after the input, or in a
//! format-named subdirectory, depending on version and flags. This module
//! resolves that with a bounded, ordered probe: no unbounded filesystem
//! walks, first match wins.

use std::path::{Path, PathBuf};

use crate::session::OutputFormat;

/// Suffixes probed for, in fixed order: markdown, json, html.
const TEXT_EXTENSIONS: [&str; 3] = ["md", "json", "html"];

/// Image suffixes the engines produce.
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Text artifacts found for one input, at most one per kind.
#[derive(Debug, Default)]
pub struct DiscoveredArtifacts {
    pub markdown: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub html: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
}

/// Ordered candidate paths for one artifact suffix: direct output
/// directory, per-document subdirectory, format-named subdirectory.
fn probe_candidates(
    output_dir: &Path,
    stem: &str,
    format: OutputFormat,
    ext: &str,
) -> [PathBuf; 3] {
    [
        output_dir.join(format!("{stem}.{ext}")),
        output_dir.join(stem).join(format!("{stem}.{ext}")),
        output_dir.join(format.as_str()).join(format!("{stem}.{ext}")),
    ]
}

/// Locate the text artifacts produced for `stem`.
///
/// Probes the candidate table first; only if that finds nothing at all,
/// falls back to a shallow listing of the output directory's immediate
/// children, then of the per-document subdirectory. Callers rely on
/// receiving the first match in this order, not an exhaustive one.
pub fn discover_artifacts(
    output_dir: &Path,
    stem: &str,
    format: OutputFormat,
) -> DiscoveredArtifacts {
    let mut found: [Option<PathBuf>; 3] = Default::default();

    for (slot, ext) in found.iter_mut().zip(TEXT_EXTENSIONS) {
        *slot = probe_candidates(output_dir, stem, format, ext)
            .into_iter()
            .find(|p| p.is_file());
    }

    if found.iter().all(Option::is_none) {
        for dir in [output_dir.to_path_buf(), output_dir.join(stem)] {
            scan_shallow(&dir, &mut found);
            if found.iter().any(Option::is_some) {
                break;
            }
        }
    }

    let metadata = [
        output_dir.join(format!("{stem}_meta.json")),
        output_dir.join(stem).join(format!("{stem}_meta.json")),
    ]
    .into_iter()
    .find(|p| p.is_file());

    let [markdown, json, html] = found;
    DiscoveredArtifacts {
        markdown,
        json,
        html,
        metadata,
    }
}

/// Fill empty slots from the immediate children of `dir`.
fn scan_shallow(dir: &Path, found: &mut [Option<PathBuf>; 3]) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    for path in files {
        // Marker's sidecar metadata is tracked separately, never as the
        // json artifact.
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with("_meta.json"))
        {
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        for (slot, want) in found.iter_mut().zip(TEXT_EXTENSIONS) {
            if slot.is_none() && ext.eq_ignore_ascii_case(want) {
                *slot = Some(path.clone());
            }
        }
    }
}

/// Locate extracted images: a fixed list of likely directories, stopping
/// at the first one that yields any image files. No aggregation across
/// directories.
pub fn locate_images(output_dir: &Path, stem: &str, input: &Path) -> Vec<PathBuf> {
    let candidates = [
        output_dir.join(stem),
        output_dir.join("images"),
        output_dir.to_path_buf(),
    ];
    for dir in candidates {
        let images = list_images(&dir, input);
        if !images.is_empty() {
            return images;
        }
    }
    Vec::new()
}

fn list_images(dir: &Path, input: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut images: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        // the uploaded document itself is never an extracted image
        .filter(|p| p != input)
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|ext| {
                    IMAGE_EXTENSIONS
                        .iter()
                        .any(|want| ext.eq_ignore_ascii_case(want))
                })
                .unwrap_or(false)
        })
        .collect();
    images.sort();
    images
}

/// Write an empty artifact in the requested format so callers always
/// receive a path, even when the engine produced nothing usable.
pub fn synthesize_placeholder(
    output_dir: &Path,
    stem: &str,
    format: OutputFormat,
) -> std::io::Result<PathBuf> {
    let path = output_dir.join(format!("{stem}.{}", format.extension()));
    std::fs::write(&path, "")?;
    Ok(path)
}
