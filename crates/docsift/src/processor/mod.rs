pub mod csv;
pub mod docx;
pub mod image;
pub mod ocr;
pub mod pdf;
pub mod spreadsheet;
pub mod table;
pub mod text;

use std::path::Path;

use tracing::warn;

use crate::error::ProcessError;
use crate::sanitize;

pub mod mime {
    pub const PDF: &str = "application/pdf";
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
    pub const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
    pub const XLS: &str = "application/vnd.ms-excel";
    pub const CSV: &str = "text/csv";
    pub const TEXT: &str = "text/plain";
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// A format-specific text extraction routine.
pub trait DocumentProcessor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ProcessError>;
    fn supports(&self, mime_type: &str) -> bool;
}

/// Turns a stored file into raw text.
///
/// Implementations never fail: any fault is logged and reported as an empty
/// string, so downstream stages see "nothing to extract" instead of an error.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, path: &Path, mime_type: &str) -> String;
}

/// Dispatch table from MIME type to format handler.
pub struct ProcessorRegistry {
    processors: Vec<Box<dyn DocumentProcessor>>,
}

impl ProcessorRegistry {
    pub fn new(ocr_enabled: bool, ocr_languages: &[String]) -> Self {
        let image: Box<dyn DocumentProcessor> = if ocr_enabled {
            Box::new(image::ImageProcessor::new(ocr::OcrProcessor::new(
                ocr_languages,
            )))
        } else {
            Box::new(image::ImageProcessor::new_without_ocr())
        };

        let processors: Vec<Box<dyn DocumentProcessor>> = vec![
            Box::new(pdf::PdfProcessor::new()),
            image,
            Box::new(docx::DocxProcessor::new()),
            Box::new(spreadsheet::SpreadsheetProcessor::new()),
            Box::new(csv::CsvProcessor::new()),
            Box::new(text::TextProcessor::new()),
        ];

        Self { processors }
    }

    /// Runs the handler registered for `mime_type`, surfacing its fault.
    pub fn try_extract(&self, path: &Path, mime_type: &str) -> Result<String, ProcessError> {
        let mime_type = normalize_mime(mime_type);

        for processor in &self.processors {
            if processor.supports(&mime_type) {
                return processor.extract(path);
            }
        }

        Err(ProcessError::UnsupportedFormat(mime_type))
    }

    pub fn supports(&self, mime_type: &str) -> bool {
        let mime_type = normalize_mime(mime_type);
        self.processors.iter().any(|p| p.supports(&mime_type))
    }
}

impl TextExtractor for ProcessorRegistry {
    fn extract_text(&self, path: &Path, mime_type: &str) -> String {
        match self.try_extract(path, mime_type) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    file = %sanitize::redact_path(path),
                    mime_type,
                    "Text extraction failed: {}",
                    e
                );
                String::new()
            }
        }
    }
}

/// Lower-cases a MIME type and drops parameters such as `; charset=utf-8`.
fn normalize_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}
