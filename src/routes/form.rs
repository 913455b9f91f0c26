//! Multipart upload parsing
//!
//! Shared by the upload and synchronous convert endpoints. All parameter
//! validation happens here, before any file is written or background work
//! scheduled.

use std::path::Path;

use axum::body::Bytes;
use axum::extract::Multipart;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::session::{ConversionOptions, LlmProvider, OutputFormat};

/// One file taken from the multipart body.
pub struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

/// Parsed upload: files plus validated conversion options.
pub struct UploadPayload {
    pub files: Vec<UploadedFile>,
    pub options: ConversionOptions,
}

/// Drain the multipart body, collecting files and form fields.
pub async fn parse_upload(multipart: &mut Multipart, config: &Config) -> Result<UploadPayload> {
    let mut files = Vec::new();

    let mut output_format = None;
    let mut extract_images = None;
    let mut max_pages = None;
    let mut use_llm = None;
    let mut llm_provider = None;
    let mut ollama_url = None;
    let mut ollama_model = None;
    let mut gemini_api_key = None;
    let mut gemini_model = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(format!("Failed to read upload: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();

        if let Some(raw_name) = field.file_name().map(|s| s.to_string()) {
            if name != "file" && name != "files" {
                tracing::debug!(field = %name, "Ignoring file field with unexpected name");
                continue;
            }
            let filename = sanitize_filename(&raw_name)?;
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Multipart(format!("Failed to read {filename}: {e}")))?;
            files.push(UploadedFile { filename, data });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::Multipart(format!("Failed to read field {name}: {e}")))?;
        match name.as_str() {
            "output_format" => output_format = Some(value),
            "extract_images" => extract_images = Some(value),
            "max_pages" => max_pages = Some(value),
            "use_llm" => use_llm = Some(value),
            "llm_provider" => llm_provider = Some(value),
            "ollama_url" => ollama_url = Some(value),
            "ollama_model" => ollama_model = Some(value),
            "gemini_api_key" => gemini_api_key = Some(value),
            "gemini_model" => gemini_model = Some(value),
            other => {
                tracing::debug!(field = other, "Ignoring unknown form field");
            }
        }
    }

    let output_format = match output_format.as_deref() {
        None | Some("") => OutputFormat::Markdown,
        Some(value) => OutputFormat::parse(value).ok_or_else(|| {
            AppError::InvalidRequest(format!("Unsupported output format: '{value}'"))
        })?,
    };

    let llm_provider = match llm_provider.as_deref() {
        None | Some("") => LlmProvider::Ollama,
        Some(value) => LlmProvider::parse(value).ok_or_else(|| {
            AppError::InvalidRequest(format!("Unknown LLM provider: '{value}'"))
        })?,
    };

    let options = ConversionOptions {
        output_format,
        extract_images: extract_images.as_deref().map(parse_bool).unwrap_or(true),
        max_pages: parse_max_pages(max_pages.as_deref())?,
        use_llm: use_llm.as_deref().map(parse_bool).unwrap_or(false),
        llm_provider,
        ollama_url: ollama_url.unwrap_or_else(|| config.ollama_url.clone()),
        ollama_model: ollama_model.unwrap_or_else(|| config.ollama_model.clone()),
        gemini_api_key: gemini_api_key.unwrap_or_default(),
        gemini_model: gemini_model.unwrap_or_else(|| config.gemini_model.clone()),
    };

    Ok(UploadPayload { files, options })
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(raw: &str) -> Result<String> {
    let name = Path::new(raw)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::InvalidRequest(format!(
            "Invalid filename: '{raw}'"
        )));
    }
    Ok(name.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

/// `max_pages` arrives as a free-form text field; empty means unlimited
/// and anything non-numeric is a client error.
fn parse_max_pages(value: Option<&str>) -> Result<Option<u32>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse::<u32>().map(Some).map_err(|_| {
        AppError::InvalidRequest(format!(
            "Invalid max_pages value: '{raw}'. Must be a number."
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_pages_parsing() {
        assert_eq!(parse_max_pages(None).unwrap(), None);
        assert_eq!(parse_max_pages(Some("")).unwrap(), None);
        assert_eq!(parse_max_pages(Some("  ")).unwrap(), None);
        assert_eq!(parse_max_pages(Some("12")).unwrap(), Some(12));
        assert!(parse_max_pages(Some("twelve")).is_err());
    }

    #[test]
    fn bools_accept_form_spellings() {
        assert!(parse_bool("true"));
        assert!(parse_bool("On"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
    }

    #[test]
    fn filenames_lose_path_components() {
        assert_eq!(sanitize_filename("doc.pdf").unwrap(), "doc.pdf");
        assert_eq!(sanitize_filename("/etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("a/b/c.pdf").unwrap(), "c.pdf");
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("..").is_err());
    }
}
