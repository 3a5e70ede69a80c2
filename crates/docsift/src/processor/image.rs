use std::path::Path;

use crate::error::ProcessError;
use crate::processor::ocr::OcrProcessor;
use crate::processor::{mime, DocumentProcessor};

/// PNG and JPEG scans. Text comes from OCR only.
pub struct ImageProcessor {
    ocr: Option<OcrProcessor>,
}

impl ImageProcessor {
    pub fn new(ocr: OcrProcessor) -> Self {
        Self { ocr: Some(ocr) }
    }

    pub fn new_without_ocr() -> Self {
        Self { ocr: None }
    }
}

impl DocumentProcessor for ImageProcessor {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.image").entered();

        let image_data = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        match self.ocr {
            Some(ref ocr) => ocr.process_image_bytes(&image_data),
            None => Err(ProcessError::OcrFailed("OCR is disabled".to_string())),
        }
    }

    fn supports(&self, mime_type: &str) -> bool {
        mime_type == mime::PNG || mime_type == mime::JPEG
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_supports_png_and_jpeg() {
        let processor = ImageProcessor::new_without_ocr();
        assert!(processor.supports(mime::PNG));
        assert!(processor.supports(mime::JPEG));
        assert!(!processor.supports(mime::PDF));
        assert!(!processor.supports("image/gif"));
    }

    #[test]
    fn test_without_ocr_is_error() {
        let temp_file = NamedTempFile::with_suffix(".png").unwrap();
        let img = image::RgbImage::new(4, 4);
        img.save(temp_file.path()).unwrap();

        let result = ImageProcessor::new_without_ocr().extract(temp_file.path());
        assert!(matches!(result, Err(ProcessError::OcrFailed(_))));
    }

    #[test]
    fn test_corrupt_image_fails_before_ocr() {
        let temp_file = NamedTempFile::with_suffix(".png").unwrap();
        std::fs::write(temp_file.path(), b"\x89PNG truncated").unwrap();

        let processor = ImageProcessor::new(OcrProcessor::new(&[]));
        match processor.extract(temp_file.path()) {
            Err(ProcessError::ImageProcessing(msg)) => assert!(msg.contains("Failed to load image")),
            _ => panic!("Expected ImageProcessing error"),
        }
    }
}
