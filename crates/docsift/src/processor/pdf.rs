use std::path::Path;

use crate::error::ProcessError;
use crate::processor::{mime, DocumentProcessor};

pub struct PdfProcessor;

impl PdfProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for PdfProcessor {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.pdf").entered();

        let pdf_bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let doc = lopdf::Document::load_mem(&pdf_bytes)
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

        Ok(extract_text_from_pdf(&doc))
    }

    fn supports(&self, mime_type: &str) -> bool {
        mime_type == mime::PDF
    }
}

/// Joins per-page text with newlines. A page whose text cannot be decoded
/// contributes an empty string.
fn extract_text_from_pdf(doc: &lopdf::Document) -> String {
    let pages: Vec<String> = doc
        .get_pages()
        .keys()
        .map(|page_num| match doc.extract_text(&[*page_num]) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("No text on page {}: {}", page_num, e);
                String::new()
            }
        })
        .collect();

    pages.join("\n")
}
