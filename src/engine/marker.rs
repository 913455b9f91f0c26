//! Marker CLI engine
//!
//! Shells out to the `marker_single` CLI from the Marker OCR project.
//! Marker owns all document understanding; this adapter only translates
//! options into flags, bounds the invocation with a timeout, and
//! normalizes failures.

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::Config;
use crate::session::{LlmProvider, OutputFormat};

use super::{ConversionEngine, ConversionRequest, EngineError};

/// File extensions Marker can consume.
const SUPPORTED_EXTENSIONS: &[&str] = &[
    // PDF
    "pdf",
    // Images
    "jpg", "jpeg", "png", "webp", "tiff", "tif", "bmp",
    // Microsoft Office
    "docx", "pptx", "xlsx",
    // E-books
    "epub", "mobi",
    // Web
    "html", "htm",
];

/// Adapter around the `marker_single` CLI.
pub struct MarkerEngine {
    bin: String,
    timeout: Duration,
}

impl MarkerEngine {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.marker_bin,
            Duration::from_secs(config.engine_timeout_secs),
        )
    }

    /// Translate a conversion request into CLI arguments.
    fn build_args(&self, request: &ConversionRequest) -> Vec<OsString> {
        let options = &request.options;
        let mut args: Vec<OsString> = vec![
            request.input.as_os_str().to_owned(),
            "--output_dir".into(),
            request.output_dir.as_os_str().to_owned(),
            "--output_format".into(),
        ];

        // PDF output is produced by post-processing; Marker itself only
        // knows markdown/json/html.
        let cli_format = match options.output_format {
            OutputFormat::Pdf => OutputFormat::Markdown,
            other => other,
        };
        args.push(cli_format.as_str().into());

        if !options.extract_images {
            args.push("--disable_image_extraction".into());
        }

        if let Some(max_pages) = options.max_pages {
            args.push("--page_range".into());
            args.push(format!("0-{}", max_pages.saturating_sub(1)).into());
        }

        if options.use_llm {
            args.push("--use_llm".into());
            match options.llm_provider {
                LlmProvider::Ollama => {
                    args.push("--llm_service".into());
                    args.push("marker.services.ollama.OllamaService".into());
                    args.push("--OllamaService_ollama_base_url".into());
                    args.push(options.ollama_url.clone().into());
                    args.push("--OllamaService_ollama_model".into());
                    args.push(options.ollama_model.clone().into());
                }
                LlmProvider::Gemini => {
                    args.push("--llm_service".into());
                    args.push("marker.services.gemini.GoogleGeminiService".into());
                    args.push("--GoogleGeminiService_gemini_api_key".into());
                    args.push(options.gemini_api_key.clone().into());
                    args.push("--GoogleGeminiService_gemini_model_name".into());
                    args.push(options.gemini_model.clone().into());
                }
            }
        }

        args
    }
}

#[async_trait]
impl ConversionEngine for MarkerEngine {
    fn name(&self) -> &'static str {
        "marker"
    }

    async fn is_available(&self) -> bool {
        let mut probe = Command::new(&self.bin);
        probe.arg("--help").kill_on_drop(true);
        match tokio::time::timeout(Duration::from_secs(5), probe.output()).await {
            Ok(Ok(output)) => output.status.success(),
            _ => false,
        }
    }

    fn accepts(&self, input: &Path) -> bool {
        input
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                SUPPORTED_EXTENSIONS
                    .iter()
                    .any(|want| ext.eq_ignore_ascii_case(want))
            })
            .unwrap_or(false)
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<(), EngineError> {
        if !self.accepts(&request.input) {
            return Err(EngineError::UnsupportedInput(
                request.input.display().to_string(),
            ));
        }

        let args = self.build_args(request);
        tracing::debug!(bin = %self.bin, ?args, "Running Marker CLI");

        let mut command = Command::new(&self.bin);
        command.args(&args).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::Unavailable(format!(
                    "{} not found; install Marker with `pip install marker-pdf[full]`",
                    self.bin
                )));
            }
            Ok(Err(e)) => return Err(EngineError::Io(e)),
            Err(_) => return Err(EngineError::Timeout(self.timeout.as_secs())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                "Unknown CLI error".to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(EngineError::Failed(format!("Marker CLI failed: {message}")));
        }

        Ok(())
    }
}
