//! Conversion engines
//!
//! Defines the engine adapter trait and implementations for the external
//! backends that actually perform document conversion. The server itself
//! never parses documents; engines write artifacts into a session's output
//! directory and the pipeline discovers them afterwards.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::session::ConversionOptions;

mod marker;
mod vision;

pub use marker::MarkerEngine;
pub use vision::VisionEngine;

/// One engine invocation: a single input document converted into the
/// session's output directory.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub options: ConversionOptions,
}

/// Engine adapter errors.
///
/// `Timeout` is deliberately distinct from `Failed`: callers report the two
/// with different failure reasons.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine not available: {0}")]
    Unavailable(String),

    #[error("Conversion timed out after {0} seconds")]
    Timeout(u64),

    #[error("Conversion failed: {0}")]
    Failed(String),

    #[error("Unsupported input file: {0}")]
    UnsupportedInput(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Conversion engine trait.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Engine identifier used in logs and the health endpoint.
    fn name(&self) -> &'static str;

    /// Whether the backend can currently be reached.
    async fn is_available(&self) -> bool;

    /// Whether this engine can process the given input file at all.
    /// Checked synchronously at upload time, before any background work.
    fn accepts(&self, input: &Path) -> bool;

    /// Convert one document, writing artifacts into
    /// [`ConversionRequest::output_dir`].
    async fn convert(&self, request: &ConversionRequest) -> Result<(), EngineError>;
}

/// Mock engine for tests: writes configurable artifacts into the output
/// directory, or fails for matching filenames.
#[cfg(test)]
pub struct MockEngine {
    /// `(extension, content)` pairs written as `<stem>.<ext>`.
    pub write: Vec<(&'static str, &'static str)>,
    /// Number of `figure_<i>.png` images written alongside.
    pub images: usize,
    /// Inputs whose file name contains this substring fail.
    pub fail_on: Option<&'static str>,
}

#[cfg(test)]
impl Default for MockEngine {
    fn default() -> Self {
        Self {
            write: vec![("md", "# mock output\n")],
            images: 0,
            fail_on: None,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ConversionEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn accepts(&self, _input: &Path) -> bool {
        true
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<(), EngineError> {
        let file_name = request
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(marker) = self.fail_on {
            if file_name.contains(marker) {
                return Err(EngineError::Failed(format!("mock failure for {file_name}")));
            }
        }

        let stem = request
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        for (ext, content) in &self.write {
            std::fs::write(request.output_dir.join(format!("{stem}.{ext}")), content)?;
        }
        for i in 0..self.images {
            std::fs::write(request.output_dir.join(format!("figure_{i}.png")), b"png")?;
        }
        Ok(())
    }
}
