use std::path::Path;

use crate::error::ProcessError;
use crate::processor::{mime, table, DocumentProcessor};

pub struct CsvProcessor;

impl CsvProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for CsvProcessor {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.csv").entered();

        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| ProcessError::CsvProcessing(format!("Failed to open CSV: {}", e)))?;

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record
                .map_err(|e| ProcessError::CsvProcessing(format!("Malformed record: {}", e)))?;
            rows.push(record.iter().map(|f| f.trim().to_string()).collect());
        }

        Ok(table::render_rows(&rows))
    }

    fn supports(&self, mime_type: &str) -> bool {
        mime_type == mime::CSV
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_renders_rows_as_table() {
        let temp_file = NamedTempFile::with_suffix(".csv").unwrap();
        std::fs::write(
            temp_file.path(),
            "account,balance\ncash,1200.00\nreceivables,300.50\n",
        )
        .unwrap();

        let text = CsvProcessor::new().extract(temp_file.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "account      balance");
        assert_eq!(lines[1], "cash         1200.00");
        assert_eq!(lines[2], "receivables  300.50");
    }

    #[test]
    fn test_blank_file_yields_empty_text() {
        let temp_file = NamedTempFile::with_suffix(".csv").unwrap();
        std::fs::write(temp_file.path(), "").unwrap();

        let text = CsvProcessor::new().extract(temp_file.path()).unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn test_quoted_fields() {
        let temp_file = NamedTempFile::with_suffix(".csv").unwrap();
        std::fs::write(temp_file.path(), "name,note\n\"Acme, Inc.\",\"said \"\"hi\"\"\"\n").unwrap();

        let text = CsvProcessor::new().extract(temp_file.path()).unwrap();
        assert!(text.contains("Acme, Inc."));
        assert!(text.contains("said \"hi\""));
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = CsvProcessor::new().extract(Path::new("/nonexistent/data.csv"));
        assert!(matches!(result, Err(ProcessError::CsvProcessing(_))));
    }
}
