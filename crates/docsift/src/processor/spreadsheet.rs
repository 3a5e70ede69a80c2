use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};

use crate::error::ProcessError;
use crate::processor::{mime, table, DocumentProcessor};

/// Handles `.xlsx` and legacy `.xls` workbooks.
pub struct SpreadsheetProcessor;

impl SpreadsheetProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SpreadsheetProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for SpreadsheetProcessor {
    fn extract(&self, path: &Path) -> Result<String, ProcessError> {
        let _span = tracing::info_span!("processor.spreadsheet").entered();

        let mut workbook = open_workbook_auto(path).map_err(|e| {
            ProcessError::SpreadsheetProcessing(format!("Failed to open workbook: {}", e))
        })?;

        let mut text = String::new();
        for name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&name).map_err(|e| {
                ProcessError::SpreadsheetProcessing(format!("Failed to read sheet {}: {}", name, e))
            })?;
            text.push_str(&render_sheet(&name, &range));
        }

        Ok(text)
    }

    fn supports(&self, mime_type: &str) -> bool {
        mime_type == mime::XLSX || mime_type == mime::XLS
    }
}

fn render_sheet(name: &str, range: &Range<Data>) -> String {
    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();

    format!("Sheet: {}\n{}\n", name, table::render_rows(&rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_render_sheet_header_and_rows() {
        let mut range: Range<Data> = Range::new((0, 0), (2, 1));
        range.set_value((0, 0), Data::String("line".to_string()));
        range.set_value((0, 1), Data::String("amount".to_string()));
        range.set_value((1, 0), Data::String("revenue".to_string()));
        range.set_value((1, 1), Data::Int(5000));
        range.set_value((2, 0), Data::String("costs".to_string()));
        range.set_value((2, 1), Data::Int(1200));

        let out = render_sheet("Q1", &range);
        assert_eq!(
            out,
            "Sheet: Q1\nline     amount\nrevenue  5000\ncosts    1200\n"
        );
    }

    #[test]
    fn test_empty_cells_render_blank() {
        let mut range: Range<Data> = Range::new((0, 0), (1, 1));
        range.set_value((0, 0), Data::String("a".to_string()));
        range.set_value((1, 1), Data::String("b".to_string()));

        let out = render_sheet("S", &range);
        assert_eq!(out, "Sheet: S\na\n   b\n");
    }

    #[test]
    fn test_invalid_workbook_is_error() {
        let temp_file = NamedTempFile::with_suffix(".xlsx").unwrap();
        std::fs::write(temp_file.path(), b"not a workbook").unwrap();

        let result = SpreadsheetProcessor::new().extract(temp_file.path());
        assert!(matches!(result, Err(ProcessError::SpreadsheetProcessing(_))));
    }

    #[test]
    fn test_supports_both_excel_formats() {
        let processor = SpreadsheetProcessor::new();
        assert!(processor.supports(mime::XLSX));
        assert!(processor.supports(mime::XLS));
        assert!(!processor.supports(mime::CSV));
    }
}
