//! Vision-language OCR engine
//!
//! Alternative to the Marker CLI for image inputs: sends the image to a
//! vision-language model (local Ollama or hosted Gemini) with a fixed
//! text-extraction prompt, then writes the generated text into the output
//! directory in the same shape Marker would have produced, so the rest of
//! the pipeline cannot tell the engines apart.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine as _;

use crate::config::Config;
use crate::session::{LlmProvider, OutputFormat};

use super::{ConversionEngine, ConversionRequest, EngineError};

const PROMPT: &str =
    "Extract all text from this image exactly as written. Return only the extracted text, nothing else.";

/// Image extensions the vision API accepts. Everything else is rejected
/// before any background work starts.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tiff", "tif", "bmp"];

/// Vision-language OCR engine with Ollama and Gemini backends.
pub struct VisionEngine {
    client: reqwest::Client,
    ollama_url: String,
    ollama_model: String,
    gemini_model: String,
}

impl VisionEngine {
    pub fn new(
        ollama_url: impl Into<String>,
        ollama_model: impl Into<String>,
        gemini_model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            ollama_url: ollama_url.into(),
            ollama_model: ollama_model.into(),
            gemini_model: gemini_model.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.ollama_url,
            &config.ollama_model,
            &config.gemini_model,
        )
    }

    /// Call the Ollama generate API with an attached image.
    async fn ollama_generate(
        &self,
        url: &str,
        model: &str,
        image_base64: &str,
    ) -> Result<String, EngineError> {
        let endpoint = format!("{}/api/generate", url.trim_end_matches('/'));
        let request = serde_json::json!({
            "model": model,
            "prompt": PROMPT,
            "images": [image_base64],
            "stream": false,
        });

        let response = self
            .client
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Api(format!("Failed to call Ollama: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Api(format!("Ollama returned {status}: {body}")));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::Api(format!("Failed to parse Ollama response: {e}")))?;

        Ok(result["response"].as_str().unwrap_or("").trim().to_string())
    }

    /// Call the Gemini generateContent API with an inline image.
    async fn gemini_generate(
        &self,
        api_key: &str,
        model: &str,
        mime_type: &str,
        image_base64: &str,
    ) -> Result<String, EngineError> {
        if api_key.is_empty() {
            return Err(EngineError::Api(
                "gemini_api_key is required for the Gemini provider".to_string(),
            ));
        }

        let endpoint = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent?key={api_key}"
        );
        let request = serde_json::json!({
            "contents": [{
                "parts": [
                    { "text": PROMPT },
                    { "inline_data": { "mime_type": mime_type, "data": image_base64 } },
                ],
            }],
        });

        let response = self
            .client
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Api(format!("Failed to call Gemini: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Api(format!("Gemini returned {status}: {body}")));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::Api(format!("Failed to parse Gemini response: {e}")))?;

        let text = result["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();
        Ok(text)
    }

    /// Write the generated text as the artifact Marker would have produced
    /// for the requested format.
    fn write_artifact(
        output_dir: &Path,
        stem: &str,
        format: OutputFormat,
        text: &str,
    ) -> Result<(), EngineError> {
        match format {
            OutputFormat::Markdown | OutputFormat::Pdf => {
                std::fs::write(output_dir.join(format!("{stem}.md")), text)?;
            }
            OutputFormat::Json => {
                let body = serde_json::json!({ "text": text });
                std::fs::write(
                    output_dir.join(format!("{stem}.json")),
                    serde_json::to_vec_pretty(&body)
                        .map_err(|e| EngineError::Failed(e.to_string()))?,
                )?;
            }
            OutputFormat::Html => {
                let escaped = text
                    .replace('&', "&amp;")
                    .replace('<', "&lt;")
                    .replace('>', "&gt;");
                let html = format!(
                    "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{stem}</title></head>\n<body><pre>{escaped}</pre></body>\n</html>\n"
                );
                std::fs::write(output_dir.join(format!("{stem}.html")), html)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ConversionEngine for VisionEngine {
    fn name(&self) -> &'static str {
        "vision"
    }

    async fn is_available(&self) -> bool {
        // Only the local backend can be probed; the hosted API is assumed
        // reachable.
        let endpoint = format!("{}/api/tags", self.ollama_url.trim_end_matches('/'));
        match self.client.get(&endpoint).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn accepts(&self, input: &Path) -> bool {
        input
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|want| ext.eq_ignore_ascii_case(want))
            })
            .unwrap_or(false)
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<(), EngineError> {
        if !self.accepts(&request.input) {
            return Err(EngineError::UnsupportedInput(format!(
                "{}: the vision API only accepts image files",
                request.input.display()
            )));
        }

        let bytes = tokio::fs::read(&request.input).await?;
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let mime_type = mime_guess::from_path(&request.input)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        let options = &request.options;
        let text = match options.llm_provider {
            LlmProvider::Gemini => {
                self.gemini_generate(
                    &options.gemini_api_key,
                    &options.gemini_model,
                    &mime_type,
                    &image_base64,
                )
                .await?
            }
            LlmProvider::Ollama => {
                let url = if options.ollama_url.is_empty() {
                    &self.ollama_url
                } else {
                    &options.ollama_url
                };
                let model = if options.ollama_model.is_empty() {
                    &self.ollama_model
                } else {
                    &options.ollama_model
                };
                self.ollama_generate(url, model, &image_base64).await?
            }
        };

        let stem = request
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        Self::write_artifact(&request.output_dir, &stem, options.output_format, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ConversionOptions, LlmProvider};
    use std::path::PathBuf;

    fn engine() -> VisionEngine {
        VisionEngine::new("http://localhost:11434", "llava", "gemini-1.5-flash")
    }

    #[test]
    fn accepts_images_only() {
        let engine = engine();
        assert!(engine.accepts(Path::new("page.png")));
        assert!(engine.accepts(Path::new("scan.JPG")));
        assert!(!engine.accepts(Path::new("report.pdf")));
        assert!(!engine.accepts(Path::new("notes.docx")));
    }

    #[tokio::test]
    async fn rejects_non_image_input_before_reading_it() {
        let engine = engine();
        let request = ConversionRequest {
            input: PathBuf::from("/nonexistent/report.pdf"),
            output_dir: PathBuf::from("/tmp"),
            options: ConversionOptions {
                output_format: OutputFormat::Markdown,
                extract_images: true,
                max_pages: None,
                use_llm: false,
                llm_provider: LlmProvider::Ollama,
                ollama_url: String::new(),
                ollama_model: String::new(),
                gemini_api_key: String::new(),
                gemini_model: String::new(),
            },
        };
        match engine.convert(&request).await {
            Err(EngineError::UnsupportedInput(_)) => {}
            other => panic!("expected UnsupportedInput, got {other:?}"),
        }
    }

    #[test]
    fn artifacts_match_requested_format() {
        let tmp = tempfile::tempdir().unwrap();
        VisionEngine::write_artifact(tmp.path(), "scan", OutputFormat::Json, "hello").unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join("scan.json")).unwrap())
                .unwrap();
        assert_eq!(json["text"], "hello");

        VisionEngine::write_artifact(tmp.path(), "scan", OutputFormat::Html, "a < b").unwrap();
        let html = std::fs::read_to_string(tmp.path().join("scan.html")).unwrap();
        assert!(html.contains("a &lt; b"));

        VisionEngine::write_artifact(tmp.path(), "scan", OutputFormat::Pdf, "text").unwrap();
        assert!(tmp.path().join("scan.md").is_file());
    }
}
