//! Server configuration
//!
//! All settings come from the environment (a `.env` file is honored via
//! dotenvy in `main`). Every knob has a default so the server starts with
//! no configuration at all.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};

/// Which conversion engine backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// The Marker OCR CLI (`marker_single`).
    Marker,
    /// A hosted vision-language OCR API (Ollama or Gemini), image inputs only.
    Vision,
}

impl FromStr for EngineKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "marker" => Ok(Self::Marker),
            "vision" => Ok(Self::Vision),
            other => bail!("unknown engine kind: {other}"),
        }
    }
}

/// Server configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,
    /// Root directory for per-session output directories.
    pub output_root: PathBuf,
    /// Conversion engine selection.
    pub engine: EngineKind,
    /// Marker CLI binary name or path.
    pub marker_bin: String,
    /// Upper bound on a single engine invocation, in seconds.
    pub engine_timeout_secs: u64,
    /// How many session directories the retention sweep keeps.
    pub keep_recent: usize,
    /// Run a retention sweep before accepting requests.
    pub cleanup_on_start: bool,
    /// Request body limit for uploads, in bytes.
    pub max_upload_bytes: usize,
    /// markdown -> HTML converter binary.
    pub pandoc_bin: String,
    /// HTML -> PDF renderer binary.
    pub weasyprint_bin: String,
    /// Default Ollama endpoint for LLM-assisted conversion.
    pub ollama_url: String,
    /// Default Ollama model name.
    pub ollama_model: String,
    /// Default Gemini model name.
    pub gemini_model: String,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: env_parse("DOCMILL_PORT", 8100)?,
            output_root: PathBuf::from(env_or("DOCMILL_OUTPUT_ROOT", "outputs")),
            engine: env_parse("DOCMILL_ENGINE", EngineKind::Marker)?,
            marker_bin: env_or("DOCMILL_MARKER_BIN", "marker_single"),
            engine_timeout_secs: env_parse("DOCMILL_ENGINE_TIMEOUT_SECS", 300)?,
            keep_recent: env_parse("DOCMILL_KEEP_RECENT", 5)?,
            cleanup_on_start: env_parse("DOCMILL_CLEANUP_ON_START", true)?,
            max_upload_bytes: env_parse("DOCMILL_MAX_UPLOAD_BYTES", 100 * 1024 * 1024)?,
            pandoc_bin: env_or("DOCMILL_PANDOC_BIN", "pandoc"),
            weasyprint_bin: env_or("DOCMILL_WEASYPRINT_BIN", "weasyprint"),
            ollama_url: env_or("DOCMILL_OLLAMA_URL", "http://host.docker.internal:11434"),
            ollama_model: env_or("DOCMILL_OLLAMA_MODEL", "gemma3:12b"),
            gemini_model: env_or("DOCMILL_GEMINI_MODEL", "gemini-1.5-flash"),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8100,
            output_root: PathBuf::from("outputs"),
            engine: EngineKind::Marker,
            marker_bin: "marker_single".to_string(),
            engine_timeout_secs: 300,
            keep_recent: 5,
            cleanup_on_start: true,
            max_upload_bytes: 100 * 1024 * 1024,
            pandoc_bin: "pandoc".to_string(),
            weasyprint_bin: "weasyprint".to_string(),
            ollama_url: "http://host.docker.internal:11434".to_string(),
            ollama_model: "gemma3:12b".to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|e| anyhow!("invalid value for {key}: {value:?}: {e}")),
        Err(_) => Ok(default),
    }
}
