//! Session record types
//!
//! These are the wire shapes returned by the status endpoints, so field
//! names are part of the API.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Requested output format for a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Markdown,
    Json,
    Html,
    Pdf,
}

impl OutputFormat {
    /// Parse the form-field spelling. Unknown values are a client error.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Some(Self::Markdown),
            "json" => Some(Self::Json),
            "html" => Some(Self::Html),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }

    /// File extension of the artifact this format produces.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }

    /// The kind of artifact a request for this format ultimately wants.
    pub fn artifact_kind(&self) -> ArtifactKind {
        match self {
            Self::Markdown => ArtifactKind::Markdown,
            Self::Json => ArtifactKind::Json,
            Self::Html => ArtifactKind::Html,
            Self::Pdf => ArtifactKind::Pdf,
        }
    }
}

/// Kind of output artifact produced for one input file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Markdown,
    Json,
    Html,
    Pdf,
    Metadata,
}

/// LLM provider used for enhanced conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    Gemini,
}

impl LlmProvider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }
}

/// Runtime conversion options for one batch, including live credentials.
///
/// Never serialized; the session record carries the redacted
/// [`ConversionSettings`] snapshot instead.
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    pub output_format: OutputFormat,
    pub extract_images: bool,
    pub max_pages: Option<u32>,
    pub use_llm: bool,
    pub llm_provider: LlmProvider,
    pub ollama_url: String,
    pub ollama_model: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
}

impl ConversionOptions {
    /// Snapshot for the session record, with secrets redacted.
    pub fn redacted_settings(&self) -> ConversionSettings {
        ConversionSettings {
            output_format: self.output_format,
            extract_images: self.extract_images,
            max_pages: self.max_pages,
            use_llm: self.use_llm,
            llm_provider: self.llm_provider,
            ollama_url: self.ollama_url.clone(),
            ollama_model: self.ollama_model.clone(),
            gemini_api_key: if self.gemini_api_key.is_empty() {
                String::new()
            } else {
                "***".to_string()
            },
            gemini_model: self.gemini_model.clone(),
        }
    }
}

/// Redacted settings snapshot stored on the session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionSettings {
    pub output_format: OutputFormat,
    pub extract_images: bool,
    pub max_pages: Option<u32>,
    pub use_llm: bool,
    pub llm_provider: LlmProvider,
    pub ollama_url: String,
    pub ollama_model: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
}

/// Session status over its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Processing,
    Completed,
    Failed,
}

/// Per-file status within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Processing,
    Completed,
    Failed,
}

/// Which API variant created the session; determines the directory prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Background batch created by `POST /api/upload`.
    Session,
    /// One-shot synchronous conversion via `POST /convert`.
    Convert,
}

impl SessionKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Convert => "convert",
        }
    }
}

/// Result record for one file in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    pub filename: String,
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<ArtifactKind, PathBuf>,
    pub images_extracted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileResult {
    pub fn completed(
        filename: impl Into<String>,
        outputs: BTreeMap<ArtifactKind, PathBuf>,
        images_extracted: usize,
    ) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Completed,
            outputs,
            images_extracted,
            error: None,
        }
    }

    pub fn failed(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Failed,
            outputs: BTreeMap::new(),
            images_extracted: 0,
            error: Some(error.into()),
        }
    }
}

/// One batch-upload's worth of in-memory state.
///
/// Lives only in the session store; not persisted across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub kind: SessionKind,
    pub status: SessionStatus,
    pub total_files: usize,
    pub processed_files: usize,
    pub files: Vec<FileResult>,
    pub settings: ConversionSettings,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Session {
    pub fn new(
        id: Uuid,
        kind: SessionKind,
        total_files: usize,
        settings: ConversionSettings,
    ) -> Self {
        Self {
            id,
            kind,
            status: SessionStatus::Processing,
            total_files,
            processed_files: 0,
            files: Vec::new(),
            settings,
            started_at: Utc::now(),
            completed_at: None,
            failed_at: None,
            error: None,
        }
    }

    /// Directory name under the outputs root, e.g. `session_<uuid>`.
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.kind.prefix(), self.id)
    }

    pub fn record_file(&mut self, result: FileResult) {
        self.files.push(result);
        self.processed_files = self.files.len();
    }

    pub fn mark_completed(&mut self) {
        self.status = SessionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = SessionStatus::Failed;
        self.failed_at = Some(Utc::now());
        self.error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ConversionOptions {
        ConversionOptions {
            output_format: OutputFormat::Markdown,
            extract_images: true,
            max_pages: None,
            use_llm: false,
            llm_provider: LlmProvider::Ollama,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "gemma3:12b".to_string(),
            gemini_api_key: "super-secret".to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
        }
    }

    #[test]
    fn settings_redact_api_key() {
        let settings = options().redacted_settings();
        assert_eq!(settings.gemini_api_key, "***");

        let mut opts = options();
        opts.gemini_api_key = String::new();
        assert_eq!(opts.redacted_settings().gemini_api_key, "");
    }

    #[test]
    fn output_format_parses() {
        assert_eq!(OutputFormat::parse("markdown"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("pdf"), Some(OutputFormat::Pdf));
        assert_eq!(OutputFormat::parse("docx"), None);
    }

    #[test]
    fn recording_files_tracks_progress() {
        let mut session = Session::new(
            Uuid::new_v4(),
            SessionKind::Session,
            2,
            options().redacted_settings(),
        );
        assert_eq!(session.processed_files, 0);

        session.record_file(FileResult::failed("a.pdf", "boom"));
        session.record_file(FileResult::completed("b.pdf", BTreeMap::new(), 0));
        session.mark_completed();

        assert_eq!(session.processed_files, 2);
        assert_eq!(session.files.len(), 2);
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.completed_at.is_some());
    }
}
