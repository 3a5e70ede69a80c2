use std::sync::Arc;

use chrono::Utc;
use tracing::{info, info_span, warn};

use crate::broadcast::{ProgressEvent, ProgressKind};
use crate::db::{batch_repo, document_repo, Database};
use crate::model::{round2, BatchJob, BatchStatus, Document, ResultsSummary};
use crate::pipeline::{DocumentPipeline, Outcome, ProgressReporter};

use super::error::BatchError;

/// Drives one batch through `queued → processing → completed`.
///
/// Documents are processed one at a time in load order. A document that
/// fails, or whose run returns an error, is counted as failed and the batch
/// moves on. Only faults outside a single document mark the batch `failed`.
/// A batch that is already `processing` is refused and left untouched.
pub struct BatchCoordinator {
    pipeline: Arc<DocumentPipeline>,
}

impl BatchCoordinator {
    pub fn new(pipeline: Arc<DocumentPipeline>) -> Self {
        Self { pipeline }
    }

    fn db(&self) -> &Database {
        self.pipeline.database()
    }

    pub fn run(
        &self,
        batch_id: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<BatchJob, BatchError> {
        let _batch_span = info_span!("batch", batch_id).entered();

        if batch_repo::find_by_batch_id(self.db(), batch_id)?.is_none() {
            return Err(BatchError::NotFound(batch_id.to_string()));
        }

        let documents = document_repo::find_by_batch(self.db(), batch_id)?;
        let total = documents.len() as i64;
        if !batch_repo::mark_started(self.db(), batch_id, total, Utc::now())? {
            warn!("Batch is already being processed");
            return Err(BatchError::AlreadyRunning(batch_id.to_string()));
        }
        progress.report(ProgressEvent::for_batch(
            batch_id,
            ProgressKind::BatchStarted { total },
        ));

        match self.run_documents(batch_id, &documents, progress) {
            Ok(summary) => {
                batch_repo::mark_completed(self.db(), batch_id, Utc::now(), &summary)?;
                info!(
                    total = summary.total,
                    completed = summary.completed,
                    failed = summary.failed,
                    "Batch completed"
                );
                progress.report(ProgressEvent::for_batch(
                    batch_id,
                    ProgressKind::BatchFinished {
                        status: BatchStatus::Completed,
                        summary: Some(summary),
                    },
                ));
            }
            Err(e) => {
                warn!("Batch aborted: {}", e);
                if let Err(mark_err) = batch_repo::mark_failed(self.db(), batch_id, Utc::now()) {
                    warn!("Could not mark batch as failed: {}", mark_err);
                }
                progress.report(ProgressEvent::for_batch(
                    batch_id,
                    ProgressKind::BatchFinished {
                        status: BatchStatus::Failed,
                        summary: None,
                    },
                ));
                return Err(e);
            }
        }

        batch_repo::find_by_batch_id(self.db(), batch_id)?
            .ok_or_else(|| BatchError::NotFound(batch_id.to_string()))
    }

    fn run_documents(
        &self,
        batch_id: &str,
        documents: &[Document],
        progress: &dyn ProgressReporter,
    ) -> Result<ResultsSummary, BatchError> {
        let total = documents.len() as i64;
        let mut completed = 0i64;
        let mut failed = 0i64;

        for (index, document) in documents.iter().enumerate() {
            match self.pipeline.process(document.id, progress) {
                Ok(Outcome::Completed { .. }) => completed += 1,
                Ok(Outcome::Failed { .. }) => failed += 1,
                Err(e) => {
                    warn!(document_id = document.id, "Document could not be processed: {}", e);
                    failed += 1;
                }
            }

            let attempted = index as i64 + 1;
            let processing = total - completed - failed;
            let percentage = round2(attempted as f64 / total as f64 * 100.0);

            batch_repo::update_progress(
                self.db(),
                batch_id,
                completed,
                failed,
                processing,
                percentage,
            )?;
            progress.report(ProgressEvent::for_batch(
                batch_id,
                ProgressKind::BatchProgress {
                    completed,
                    failed,
                    processing,
                    progress: percentage,
                },
            ));
        }

        Ok(ResultsSummary::new(total, completed, failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeCatalog;
    use crate::extraction::StructuredExtractor;
    use crate::model::{DocumentStatus, NewDocument, ProcessingMode};
    use crate::pipeline::NoopProgress;
    use crate::processor::ProcessorRegistry;
    use tempfile::TempDir;

    fn coordinator(db: &Database) -> BatchCoordinator {
        let catalog = Arc::new(TypeCatalog::builtin());
        let pipeline = DocumentPipeline::new(
            db.clone(),
            Arc::new(ProcessorRegistry::new(false, &[])),
            Arc::new(StructuredExtractor::template_only(catalog)),
            1000,
        );
        BatchCoordinator::new(Arc::new(pipeline))
    }

    fn add(db: &Database, dir: &TempDir, batch_id: &str, name: &str, content: &str) -> i64 {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        document_repo::insert(
            db,
            &NewDocument {
                filename: name.to_string(),
                original_filename: name.to_string(),
                file_path: path.to_string_lossy().to_string(),
                file_size: content.len() as i64,
                file_hash: "ab".repeat(32),
                mime_type: "text/plain".to_string(),
                expected_type: "receipt".to_string(),
                detected_type: Some("receipt".to_string()),
                type_mismatch: false,
                processing_mode: ProcessingMode::Multiple,
                batch_id: Some(batch_id.to_string()),
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_run_completes_all_documents() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        batch_repo::insert(&db, "b1", 2).unwrap();
        add(&db, &dir, "b1", "a.txt", "TOTAL 1.00");
        add(&db, &dir, "b1", "b.txt", "TOTAL 2.00");

        let job = coordinator(&db).run("b1", &NoopProgress).unwrap();

        assert_eq!(job.status, BatchStatus::Completed);
        assert_eq!(job.completed_documents, 2);
        assert_eq!(job.failed_documents, 0);
        assert_eq!(job.processing_documents, 0);
        assert_eq!(job.progress_percentage, 100.0);
        assert!(job.started_at.is_some() && job.completed_at.is_some());
        let summary = job.results_summary.unwrap();
        assert_eq!(summary, ResultsSummary::new(2, 2, 0));
        assert_eq!(summary.success_rate, 100.0);
    }

    #[test]
    fn test_document_already_processing_counts_as_failed() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        batch_repo::insert(&db, "b2", 3).unwrap();
        add(&db, &dir, "b2", "a.txt", "TOTAL 1.00");
        let stuck = add(&db, &dir, "b2", "b.txt", "TOTAL 2.00");
        add(&db, &dir, "b2", "c.txt", "TOTAL 3.00");
        document_repo::claim_for_processing(&db, stuck).unwrap();

        let job = coordinator(&db).run("b2", &NoopProgress).unwrap();

        assert_eq!(job.status, BatchStatus::Completed);
        assert_eq!(job.completed_documents, 2);
        assert_eq!(job.failed_documents, 1);
        assert_eq!(job.progress_percentage, 100.0);
        assert_eq!(job.results_summary.unwrap().success_rate, 66.67);
    }

    #[test]
    fn test_empty_batch_completes() {
        let db = Database::open_in_memory().unwrap();
        batch_repo::insert(&db, "empty", 0).unwrap();

        let job = coordinator(&db).run("empty", &NoopProgress).unwrap();

        assert_eq!(job.status, BatchStatus::Completed);
        assert_eq!(job.total_documents, 0);
        assert_eq!(job.progress_percentage, 100.0);
        assert_eq!(job.results_summary.unwrap().success_rate, 0.0);
    }

    #[test]
    fn test_batch_already_processing_is_refused() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        batch_repo::insert(&db, "busy", 1).unwrap();
        let doc = add(&db, &dir, "busy", "a.txt", "TOTAL 1.00");
        batch_repo::mark_started(&db, "busy", 1, Utc::now()).unwrap();

        let result = coordinator(&db).run("busy", &NoopProgress);

        assert!(matches!(result, Err(BatchError::AlreadyRunning(_))));
        let batch = batch_repo::find_by_batch_id(&db, "busy").unwrap().unwrap();
        assert_eq!(batch.status, BatchStatus::Processing);
        assert_eq!(batch.processing_documents, 1);
        let stored = document_repo::find_by_id(&db, doc).unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Uploaded);
    }

    #[test]
    fn test_completed_batch_can_run_again() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        batch_repo::insert(&db, "again", 1).unwrap();
        add(&db, &dir, "again", "a.txt", "TOTAL 1.00");
        let coordinator = coordinator(&db);

        coordinator.run("again", &NoopProgress).unwrap();
        let job = coordinator.run("again", &NoopProgress).unwrap();

        assert_eq!(job.status, BatchStatus::Completed);
        assert_eq!(job.completed_documents, 1);
    }

    #[test]
    fn test_unknown_batch() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            coordinator(&db).run("missing", &NoopProgress),
            Err(BatchError::NotFound(_))
        ));
    }

    #[test]
    fn test_progress_is_monotonic() {
        use crate::broadcast::ProgressBroadcaster;

        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        batch_repo::insert(&db, "b3", 3).unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            add(&db, &dir, "b3", name, "TOTAL 5.00");
        }
        let broadcaster = ProgressBroadcaster::new(64);
        let mut rx = broadcaster.subscribe();

        coordinator(&db).run("b3", &broadcaster).unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ProgressKind::BatchProgress { progress, .. } = event.kind {
                seen.push(progress);
            }
        }
        assert_eq!(seen, vec![33.33, 66.67, 100.0]);

        for doc in document_repo::find_by_batch(&db, "b3").unwrap() {
            assert_eq!(doc.status, DocumentStatus::Completed);
        }
    }
}
