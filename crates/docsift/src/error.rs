use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocsiftError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Batch error: {0}")]
    Batch(#[from] crate::batch::BatchError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("A type catalog needs at least one document type")]
    Empty,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Faults raised inside a single format handler.
///
/// These never reach pipeline callers: the processor registry logs them and
/// substitutes an empty string.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Failed to process DOCX: {0}")]
    DocxProcessing(String),

    #[error("Failed to process spreadsheet: {0}")]
    SpreadsheetProcessing(String),

    #[error("Failed to process CSV: {0}")]
    CsvProcessing(String),

    #[error("Failed to process image: {0}")]
    ImageProcessing(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("File '{filename}' is {size} bytes, limit is {limit}")]
    TooLarge {
        filename: String,
        size: u64,
        limit: u64,
    },

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("No files to upload")]
    NoFiles,

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, DocsiftError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_then_fail() -> Result<()> {
        Err(UploadError::NoFiles)?
    }

    #[test]
    fn test_umbrella_wraps_component_errors() {
        let err = upload_then_fail().unwrap_err();
        assert!(matches!(err, DocsiftError::Upload(UploadError::NoFiles)));
        assert_eq!(err.to_string(), "Upload error: No files to upload");

        let err: DocsiftError = crate::batch::BatchError::NotFound("b1".to_string()).into();
        assert!(err.to_string().starts_with("Batch error:"));
    }

    #[test]
    fn test_too_large_message_names_limit() {
        let err = UploadError::TooLarge {
            filename: "scan.pdf".to_string(),
            size: 11,
            limit: 10,
        };
        assert_eq!(err.to_string(), "File 'scan.pdf' is 11 bytes, limit is 10");
    }
}
