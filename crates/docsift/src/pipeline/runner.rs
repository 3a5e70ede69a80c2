use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info_span, warn};

use crate::broadcast::{ProgressEvent, ProgressKind};
use crate::catalog::TypeCatalog;
use crate::config::Config;
use crate::db::document_repo::{self, Claim};
use crate::db::{extracted_repo, Database, DatabaseError};
use crate::extraction::{Extraction, FieldExtractor, StructuredExtractor};
use crate::model::{Document, DocumentStatus, ExtractedData};
use crate::processor::{ProcessorRegistry, TextExtractor};

use super::error::PipelineError;
use super::progress::ProgressReporter;

/// Terminal state of one processing attempt, with the rows as persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed {
        document: Document,
        extracted: ExtractedData,
    },
    Failed {
        document: Document,
        error: String,
    },
}

impl Outcome {
    pub fn document(&self) -> &Document {
        match self {
            Outcome::Completed { document, .. } | Outcome::Failed { document, .. } => document,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }
}

/// Output of the text and field extraction steps.
struct StepOutput {
    text: String,
    extraction: Extraction,
    confidence: f64,
    elapsed_secs: f64,
}

/// Runs text extraction and field extraction for one document and records
/// the result.
pub struct DocumentPipeline {
    db: Database,
    text_extractor: Arc<dyn TextExtractor>,
    field_extractor: Arc<dyn FieldExtractor>,
    raw_text_sample_chars: usize,
}

impl DocumentPipeline {
    pub fn new(
        db: Database,
        text_extractor: Arc<dyn TextExtractor>,
        field_extractor: Arc<dyn FieldExtractor>,
        raw_text_sample_chars: usize,
    ) -> Self {
        Self {
            db,
            text_extractor,
            field_extractor,
            raw_text_sample_chars,
        }
    }

    /// Production constructor: builds the format registry and the extractor
    /// from config.
    pub fn from_config(db: Database, catalog: Arc<TypeCatalog>, config: &Config) -> Self {
        let registry = ProcessorRegistry::new(config.ocr.enabled, &config.ocr.languages);
        let extractor = StructuredExtractor::from_config(catalog, &config.ai);

        Self::new(
            db,
            Arc::new(registry),
            Arc::new(extractor),
            config.extraction.raw_text_sample_chars,
        )
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Processes one document to a terminal state.
    ///
    /// Rejects a document that is already `processing` before touching it.
    /// Any other status, `completed` included, is processed again. The
    /// `processing` state is committed before extraction starts, and the
    /// document is always `completed` or `failed` when this returns `Ok`.
    pub fn process(
        &self,
        document_id: i64,
        progress: &dyn ProgressReporter,
    ) -> Result<Outcome, PipelineError> {
        let document = match document_repo::claim_for_processing(&self.db, document_id)? {
            Claim::Claimed(document) => document,
            Claim::AlreadyProcessing => return Err(PipelineError::AlreadyProcessing(document_id)),
            Claim::NotFound => return Err(PipelineError::NotFound(document_id)),
        };

        let _pipeline_span = info_span!("pipeline",
            document_id,
            filename = %document.filename,
            expected_type = %document.expected_type,
        )
        .entered();

        progress.report(ProgressEvent::new(
            document.batch_id.as_deref(),
            ProgressKind::DocumentStarted {
                document_id,
                filename: document.original_filename.clone(),
            },
        ));

        let recorded = self.run_steps(&document).and_then(|output| {
            let _step = info_span!("record_result").entered();
            guard(|| self.record_success(&document, output))?
        });

        let outcome = match recorded {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = e.to_string();
                warn!("Document processing failed: {}", message);
                retry_once(|| document_repo::mark_failed(&self.db, document_id, &message))?;
                Outcome::Failed {
                    document: self.reload(document_id)?,
                    error: message,
                }
            }
        };

        let (status, error) = match outcome {
            Outcome::Completed { .. } => (DocumentStatus::Completed, None),
            Outcome::Failed { ref error, .. } => (DocumentStatus::Failed, Some(error.clone())),
        };
        progress.report(ProgressEvent::new(
            document.batch_id.as_deref(),
            ProgressKind::DocumentFinished {
                document_id,
                status,
                error,
            },
        ));

        Ok(outcome)
    }

    fn run_steps(&self, document: &Document) -> Result<StepOutput, PipelineError> {
        let started = Instant::now();

        let text = {
            let _step = info_span!("extract_text", mime_type = %document.mime_type).entered();
            guard(|| {
                self.text_extractor
                    .extract_text(document.path(), &document.mime_type)
            })?
        };

        let extraction = {
            let _step = info_span!("extract_fields").entered();
            guard(|| self.field_extractor.extract(&text, &document.expected_type))?
        };

        let elapsed_secs = started.elapsed().as_secs_f64();
        let confidence = confidence_score(&text);

        debug!(
            chars = text.chars().count(),
            fields = extraction.data.len(),
            method = %extraction.method,
            "Extraction finished"
        );

        Ok(StepOutput {
            text,
            extraction,
            confidence,
            elapsed_secs,
        })
    }

    fn record_success(
        &self,
        document: &Document,
        output: StepOutput,
    ) -> Result<Outcome, PipelineError> {
        let sample: String = output
            .text
            .chars()
            .take(self.raw_text_sample_chars)
            .collect();

        let extracted = extracted_repo::upsert(
            &self.db,
            document.id,
            &output.extraction.data,
            &sample,
            output.extraction.method,
            output.confidence,
        )?;

        document_repo::mark_completed(
            &self.db,
            document.id,
            Utc::now(),
            output.confidence,
            output.elapsed_secs,
        )?;

        Ok(Outcome::Completed {
            document: self.reload(document.id)?,
            extracted,
        })
    }

    fn reload(&self, document_id: i64) -> Result<Document, PipelineError> {
        document_repo::find_by_id(&self.db, document_id)?.ok_or(PipelineError::NotFound(document_id))
    }
}

/// Display-only stand-in for a quality score: an integer in `[85, 99]`
/// derived from the SHA-256 of the text. Identical text always yields the
/// same value. It says nothing about extraction quality.
pub fn confidence_score(text: &str) -> f64 {
    let digest = Sha256::digest(text.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (85 + u64::from_be_bytes(prefix) % 15) as f64
}

/// Runs a storage write, repeating it once if the first attempt fails.
fn retry_once<T>(mut write: impl FnMut() -> Result<T, DatabaseError>) -> Result<T, DatabaseError> {
    write().or_else(|e| {
        warn!("Storage write failed, retrying once: {}", e);
        write()
    })
}

/// Runs a step, turning a panic into a `PipelineError`.
fn guard<T>(step: impl FnOnce() -> T) -> Result<T, PipelineError> {
    panic::catch_unwind(AssertUnwindSafe(step))
        .map_err(|payload| PipelineError::Panicked(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
