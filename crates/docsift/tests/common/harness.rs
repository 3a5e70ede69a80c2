//! Isolated environment for integration tests.
//!
//! Each `TestHarness` owns a temp directory for uploads and inputs and an
//! in-memory database, and wires the pipeline with template extraction
//! only so no test reaches the network.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use docsift::model::{Document, ProcessingMode};
use docsift::{
    BatchCoordinator, Database, DocumentPipeline, FieldExtractor, ProcessorRegistry,
    StructuredExtractor, TypeCatalog, UploadFile, Uploader,
};

pub const RAW_TEXT_SAMPLE_CHARS: usize = 1000;

pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub input_dir: PathBuf,
    pub db: Database,
    pub catalog: Arc<TypeCatalog>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");
        let input_dir = temp_dir.path().join("input");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");

        Self {
            temp_dir,
            upload_dir,
            input_dir,
            db: Database::open_in_memory().expect("Failed to open database"),
            catalog: Arc::new(TypeCatalog::builtin()),
        }
    }

    /// Write a file to the input directory.
    pub fn write_input(&self, filename: &str, content: &[u8]) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    pub fn uploader(&self) -> Uploader {
        Uploader::new(
            self.db.clone(),
            Arc::clone(&self.catalog),
            &self.upload_dir,
            docsift::config::schema::DEFAULT_MAX_UPLOAD_BYTES,
        )
    }

    /// Upload one in-memory file as a single document.
    pub fn upload(&self, filename: &str, content: &[u8], expected_type: &str) -> Document {
        self.uploader()
            .save_document(
                &UploadFile::new(filename, content.to_vec()),
                expected_type,
                ProcessingMode::Simple,
                None,
            )
            .expect("Failed to upload document")
    }

    pub fn template_extractor(&self) -> StructuredExtractor {
        StructuredExtractor::template_only(Arc::clone(&self.catalog))
    }

    /// Pipeline with OCR off and template extraction.
    pub fn pipeline(&self) -> DocumentPipeline {
        self.pipeline_with(Arc::new(self.template_extractor()))
    }

    pub fn pipeline_with(&self, field_extractor: Arc<dyn FieldExtractor>) -> DocumentPipeline {
        DocumentPipeline::new(
            self.db.clone(),
            Arc::new(ProcessorRegistry::new(false, &[])),
            field_extractor,
            RAW_TEXT_SAMPLE_CHARS,
        )
    }

    pub fn coordinator(&self) -> BatchCoordinator {
        BatchCoordinator::new(Arc::new(self.pipeline()))
    }

    pub fn coordinator_with(&self, field_extractor: Arc<dyn FieldExtractor>) -> BatchCoordinator {
        BatchCoordinator::new(Arc::new(self.pipeline_with(field_extractor)))
    }
}
