use thiserror::Error;
use tracing::debug;

use crate::types::UploadedDocument;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unsupported file type: {0}. Upload a PDF or plain-text contract.")]
    Unsupported(String),
    #[error("Could not read any text from that file.")]
    Empty,
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

pub fn is_pdf(filename: &str, content_type: Option<&str>, bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
        || content_type.is_some_and(|c| c.eq_ignore_ascii_case("application/pdf"))
        || filename.to_ascii_lowercase().ends_with(".pdf")
}

fn is_text(filename: &str, content_type: Option<&str>) -> bool {
    let lower = filename.to_ascii_lowercase();
    content_type.is_some_and(|c| c.starts_with("text/"))
        || lower.ends_with(".txt")
        || lower.ends_with(".md")
}

/// Extract text from PDF bytes.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, DocumentError> {
    // pdf-extract panics on some malformed files instead of returning an error.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(result) => result.map_err(|e| DocumentError::Pdf(e.to_string())),
        Err(_) => Err(DocumentError::Pdf("malformed PDF".into())),
    }
}

/// Turn an uploaded file into text. CPU-bound for PDFs; call from a blocking task.
pub fn extract_document(
    filename: &str,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<UploadedDocument, DocumentError> {
    let text = if is_pdf(filename, content_type, bytes) {
        extract_pdf_text(bytes)?
    } else if is_text(filename, content_type) {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        let kind = content_type
            .map(str::to_string)
            .unwrap_or_else(|| filename.to_string());
        return Err(DocumentError::Unsupported(kind));
    };

    let text = normalize_whitespace(&text);
    if text.is_empty() {
        return Err(DocumentError::Empty);
    }
    debug!(filename, chars = text.chars().count(), "document extracted");
    Ok(UploadedDocument {
        filename: filename.to_string(),
        text,
    })
}

/// Collapse runs of blank lines and trailing spaces left behind by PDF extraction.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}
