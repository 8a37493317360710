// Document text extraction
// Turns uploaded PDF bytes into plain text for chunking


use thiserror::Error;
use tracing::{debug, warn};

/// Largest document accepted for ingestion
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Document is empty")]
    Empty,
    #[error("Document is {0} bytes, the limit is {MAX_DOCUMENT_BYTES} bytes")]
    TooLarge(usize),
    #[error("Only PDF files are supported: {0}")]
    UnsupportedType(String),
    #[error("Failed to parse PDF: {0}")]
    Pdf(String),
    #[error("Document contains no extractable text")]
    NoText,
}

/// Check that `filename` and `bytes` look like an acceptable PDF upload
#[inline]
pub fn validate_document(bytes: &[u8], filename: &str) -> Result<(), ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::Empty);
    }

    if bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(ExtractionError::TooLarge(bytes.len()));
    }

    let has_pdf_extension = std::path::Path::new(filename)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !has_pdf_extension {
        return Err(ExtractionError::UnsupportedType(filename.to_string()));
    }

    if !bytes.starts_with(PDF_MAGIC) {
        return Err(ExtractionError::UnsupportedType(format!(
            "{} does not have a PDF header",
            filename
        )));
    }

    Ok(())
}

/// Extract the text of a PDF document held in memory
#[inline]
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<String, ExtractionError> {
    validate_document(bytes, filename)?;

    // pdf-extract panics on some malformed inputs
    let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| {
            warn!("PDF parser panicked on {}", filename);
            ExtractionError::Pdf("parser aborted on malformed input".to_string())
        })?
        .map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    if text.trim().is_empty() {
        return Err(ExtractionError::NoText);
    }

    debug!("Extracted {} characters from {}", text.len(), filename);
    Ok(text)
}
