use std::path::Path;

use crate::error::ProcessError;
use crate::processor::{mime, DocumentProcessor};

pub struct TextProcessor;

impl TextProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for TextProcessor {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        std::fs::read_to_string(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn supports(&self, mime_type: &str) -> bool {
        mime_type == mime::TEXT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_extract_text_file_verbatim() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "Hello, World!\n  indented line\n").unwrap();

        let processor = TextProcessor::new();
        let text = processor.extract(temp_file.path()).unwrap();

        assert_eq!(text, "Hello, World!\n  indented line\n");
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), [0xff, 0xfe, 0x00, 0xc3]).unwrap();

        let processor = TextProcessor::new();
        assert!(processor.extract(temp_file.path()).is_err());
    }

    #[test]
    fn test_supports_plain_text_only() {
        let processor = TextProcessor::new();
        assert!(processor.supports(mime::TEXT));
        assert!(!processor.supports(mime::CSV));
        assert!(!processor.supports(mime::PDF));
    }
}
