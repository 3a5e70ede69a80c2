//! Document classification and structured data extraction with batch job
//! tracking.

pub mod batch;
pub mod broadcast;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod extraction;
pub mod model;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod upload;

pub use batch::{BatchCoordinator, BatchError, BatchWorkerPool};
pub use broadcast::{ProgressBroadcaster, ProgressEvent, ProgressKind};
pub use catalog::{DocumentTypeDefinition, TypeCatalog};
pub use classifier::{Classifier, Detection};
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{CatalogError, ConfigError, DocsiftError, ProcessError, Result, UploadError};
pub use extraction::{Extraction, FieldExtractor, StructuredExtractor};
pub use pipeline::{DocumentPipeline, NoopProgress, Outcome, PipelineError};
pub use processor::{ProcessorRegistry, TextExtractor};
pub use upload::{UploadFile, Uploader};
