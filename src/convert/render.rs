//! Post-processing renderers
//!
//! PDF output is produced from Marker's markdown/HTML by two external
//! file-in/file-out tools: pandoc (markdown -> HTML) and weasyprint
//! (HTML -> PDF). Intermediate artifacts land in the same output
//! directory and are pruned with the other unrequested formats.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::engine::EngineError;

/// Print stylesheet shared by both render steps.
const PRINT_STYLESHEET: &str = r#"@page {
    margin: 1in;
    size: letter;
}
body {
    font-family: "Times New Roman", serif;
    font-size: 12pt;
    line-height: 1.5;
    color: #000;
}
h1, h2, h3, h4, h5, h6 {
    color: #333;
    margin-top: 1em;
    margin-bottom: 0.5em;
}
table {
    border-collapse: collapse;
    width: 100%;
    margin: 1em 0;
}
th, td {
    border: 1px solid #ddd;
    padding: 8px;
    text-align: left;
}
th {
    background-color: #f5f5f5;
}
img {
    max-width: 100%;
    height: auto;
}
code {
    background-color: #f5f5f5;
    padding: 2px 4px;
    border-radius: 3px;
    font-family: monospace;
}
pre {
    background-color: #f5f5f5;
    padding: 1em;
    border-radius: 5px;
    overflow-x: auto;
}
"#;

/// Name of the stylesheet intermediate written into the output directory.
pub const STYLESHEET_NAME: &str = "print.css";

/// Name of the HTML intermediate produced for `stem`.
pub fn temp_html_name(stem: &str) -> String {
    format!("{stem}_temp.html")
}

fn ensure_stylesheet(output_dir: &Path) -> std::io::Result<PathBuf> {
    let path = output_dir.join(STYLESHEET_NAME);
    if !path.exists() {
        std::fs::write(&path, PRINT_STYLESHEET)?;
    }
    Ok(path)
}

async fn run_tool(bin: &str, command: &mut Command) -> Result<(), EngineError> {
    let output = match command.kill_on_drop(true).output().await {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(EngineError::Unavailable(format!("{bin} not found")));
        }
        Err(e) => return Err(EngineError::Io(e)),
    };
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::Failed(format!(
            "{bin} failed: {}",
            stderr.trim()
        )));
    }
    Ok(())
}

/// Convert a markdown artifact to a standalone HTML intermediate.
pub async fn markdown_to_html(
    pandoc_bin: &str,
    markdown: &Path,
    output_dir: &Path,
    stem: &str,
) -> Result<PathBuf, EngineError> {
    let stylesheet = ensure_stylesheet(output_dir)?;
    let html = output_dir.join(temp_html_name(stem));

    let mut command = Command::new(pandoc_bin);
    command
        .arg(markdown)
        .arg("--standalone")
        .arg("--css")
        .arg(&stylesheet)
        .arg("--metadata")
        .arg(format!("title={stem}"))
        .arg("-o")
        .arg(&html);
    run_tool(pandoc_bin, &mut command).await?;

    if !html.is_file() {
        return Err(EngineError::Failed(format!(
            "{pandoc_bin} produced no output for {}",
            markdown.display()
        )));
    }
    tracing::debug!(html = %html.display(), "Converted markdown to HTML");
    Ok(html)
}

/// Render an HTML file to PDF.
pub async fn html_to_pdf(
    weasyprint_bin: &str,
    html: &Path,
    output_dir: &Path,
    stem: &str,
) -> Result<PathBuf, EngineError> {
    let stylesheet = ensure_stylesheet(output_dir)?;
    let pdf = output_dir.join(format!("{stem}.pdf"));

    let mut command = Command::new(weasyprint_bin);
    command.arg("-s").arg(&stylesheet).arg(html).arg(&pdf);
    run_tool(weasyprint_bin, &mut command).await?;

    if !pdf.is_file() {
        return Err(EngineError::Failed(format!(
            "{weasyprint_bin} produced no output for {}",
            html.display()
        )));
    }
    tracing::debug!(pdf = %pdf.display(), "Rendered PDF");
    Ok(pdf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_renderer_is_reported_as_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let md = tmp.path().join("doc.md");
        std::fs::write(&md, "# hi\n").unwrap();

        let result =
            markdown_to_html("definitely-not-a-real-binary", &md, tmp.path(), "doc").await;
        match result {
            Err(EngineError::Unavailable(_)) => {}
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn stylesheet_is_written_once() {
        let tmp = tempfile::tempdir().unwrap();
        let first = ensure_stylesheet(tmp.path()).unwrap();
        let second = ensure_stylesheet(tmp.path()).unwrap();
        assert_eq!(first, second);
        assert!(std::fs::read_to_string(first).unwrap().contains("@page"));
    }
}
