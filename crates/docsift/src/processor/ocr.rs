use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use crate::error::ProcessError;

#[derive(Clone)]
pub struct OcrProcessor {
    inner: Arc<OcrProcessorInner>,
}

struct OcrProcessorInner {
    languages: String,
}

impl OcrProcessor {
    pub fn new(languages: &[String]) -> Self {
        let lang_str = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self {
            inner: Arc::new(OcrProcessorInner {
                languages: lang_str,
            }),
        }
    }

    pub fn languages(&self) -> &str {
        &self.inner.languages
    }

    pub fn process_image(&self, image_path: &Path) -> Result<String, ProcessError> {
        self.process_image_bytes(&std::fs::read(image_path).map_err(|e| {
            ProcessError::ReadDocument {
                path: image_path.to_path_buf(),
                source: e,
            }
        })?)
    }

    /// Recognises text in an encoded image and returns it trimmed.
    pub fn process_image_bytes(&self, image_data: &[u8]) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.ocr").entered();

        let img = image::load_from_memory(image_data)
            .map_err(|e| ProcessError::ImageProcessing(format!("Failed to load image: {}", e)))?;

        let mut png_data = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
            .map_err(|e| ProcessError::ImageProcessing(format!("Failed to convert image: {}", e)))?;

        let text = self.recognize_png(&png_data)?;
        Ok(text.trim().to_string())
    }

    #[cfg(feature = "leptess")]
    fn recognize_png(&self, png_data: &[u8]) -> Result<String, ProcessError> {
        let mut lt = leptess::LepTess::new(None, &self.inner.languages).map_err(|e| {
            ProcessError::OcrFailed(format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_image_from_mem(png_data)
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| ProcessError::OcrFailed(format!("OCR failed: {}", e)))
    }

    /// Pipes the PNG through the `tesseract` binary.
    #[cfg(not(feature = "leptess"))]
    fn recognize_png(&self, png_data: &[u8]) -> Result<String, ProcessError> {
        use std::io::Write;
        use std::process::{Command, Stdio};

        let mut child = Command::new("tesseract")
            .args(["stdin", "stdout", "-l", &self.inner.languages])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ProcessError::OcrFailed(
                    "tesseract not found (install tesseract-ocr)".to_string(),
                ),
                _ => ProcessError::OcrFailed(format!("Failed to start tesseract: {}", e)),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(png_data).map_err(|e| {
                ProcessError::OcrFailed(format!("Failed to send image to tesseract: {}", e))
            })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| ProcessError::OcrFailed(format!("tesseract did not finish: {}", e)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ProcessError::OcrFailed(format!(
                "tesseract failed: {}",
                stderr.trim()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ocr_processor_joins_languages() {
        let processor = OcrProcessor::new(&["eng".to_string(), "deu".to_string()]);
        assert_eq!(processor.languages(), "eng+deu");
    }

    #[test]
    fn test_ocr_processor_default_language() {
        let processor = OcrProcessor::new(&[]);
        assert_eq!(processor.languages(), "eng");
    }

    #[test]
    fn test_invalid_image_data_error() {
        let processor = OcrProcessor::new(&["eng".to_string()]);

        match processor.process_image_bytes(b"not valid image data") {
            Err(ProcessError::ImageProcessing(msg)) => {
                assert!(msg.contains("Failed to load image"));
            }
            _ => panic!("Expected ImageProcessing error for invalid image data"),
        }
    }

    #[test]
    fn test_empty_image_data_error() {
        let processor = OcrProcessor::new(&[]);
        assert!(matches!(
            processor.process_image_bytes(&[]),
            Err(ProcessError::ImageProcessing(_))
        ));
    }

    #[test]
    fn test_nonexistent_file_error() {
        let processor = OcrProcessor::new(&[]);

        match processor.process_image(Path::new("/nonexistent/image.png")) {
            Err(ProcessError::ReadDocument { path, .. }) => {
                assert_eq!(path, Path::new("/nonexistent/image.png"));
            }
            _ => panic!("Expected ReadDocument error for nonexistent file"),
        }
    }

    #[test]
    fn test_clone_shares_configuration() {
        let processor = OcrProcessor::new(&["fra".to_string()]);
        let cloned = processor.clone();
        assert!(Arc::ptr_eq(&processor.inner, &cloned.inner));
    }
}
