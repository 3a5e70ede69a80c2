//! Batch upload and batch runs, including per-document failures.

mod common;

use std::sync::Arc;

use common::{pdf_bytes, TestHarness};

use docsift::db::{batch_repo, document_repo, extracted_repo};
use docsift::extraction::{Extraction, FieldExtractor, StructuredExtractor};
use docsift::model::{BatchStatus, BatchStatusView, DocumentStatus, ProcessingMode};
use docsift::pipeline::ProgressReporter;
use docsift::{BatchWorkerPool, NoopProgress, ProgressBroadcaster, ProgressKind, UploadFile};

/// Panics on any text containing the trigger, otherwise uses templates.
struct ExplodingExtractor {
    inner: StructuredExtractor,
    trigger: &'static str,
}

impl FieldExtractor for ExplodingExtractor {
    fn extract(&self, text: &str, type_key: &str) -> Extraction {
        if text.contains(self.trigger) {
            panic!("extractor blew up");
        }
        self.inner.extract(text, type_key)
    }
}

fn three_receipts() -> Vec<UploadFile> {
    vec![
        UploadFile::new("receipt_one.pdf", pdf_bytes(&["RECEIPT", "Total: $1.00"])),
        UploadFile::new(
            "receipt_two.pdf",
            pdf_bytes(&["RECEIPT", "EXPLODE", "Total: $2.00"]),
        ),
        UploadFile::new("receipt_three.pdf", pdf_bytes(&["RECEIPT", "Total: $3.00"])),
    ]
}

#[test]
fn test_batch_with_one_panicking_document() {
    let harness = TestHarness::new();
    let upload = harness
        .uploader()
        .upload_batch(&three_receipts(), "receipt")
        .unwrap();
    assert_eq!(upload.uploaded.len(), 3);

    let extractor = Arc::new(ExplodingExtractor {
        inner: harness.template_extractor(),
        trigger: "EXPLODE",
    });
    let job = harness
        .coordinator_with(extractor)
        .run(&upload.batch_id, &NoopProgress)
        .unwrap();

    assert_eq!(job.status, BatchStatus::Completed);
    assert_eq!(job.total_documents, 3);
    assert_eq!(job.completed_documents, 2);
    assert_eq!(job.failed_documents, 1);
    assert_eq!(job.processing_documents, 0);
    assert_eq!(job.progress_percentage, 100.0);
    assert_eq!(job.results_summary.unwrap().success_rate, 66.67);

    let documents = document_repo::find_by_batch(&harness.db, &upload.batch_id).unwrap();
    let statuses: Vec<DocumentStatus> = documents.iter().map(|d| d.status).collect();
    assert_eq!(
        statuses,
        vec![
            DocumentStatus::Completed,
            DocumentStatus::Failed,
            DocumentStatus::Completed
        ]
    );

    let failed = &documents[1];
    assert!(failed
        .error_message
        .as_deref()
        .unwrap()
        .contains("extractor blew up"));
    assert!(extracted_repo::find_by_document(&harness.db, failed.id)
        .unwrap()
        .is_none());
}

#[test]
fn test_batch_upload_auto_type_and_rejects() {
    let harness = TestHarness::new();
    let files = vec![
        UploadFile::new("april_invoice.pdf", pdf_bytes(&["Total: 9.00"])),
        UploadFile::new("shop_receipt.pdf", pdf_bytes(&["Total: 1.00"])),
        UploadFile::new("notes.txt", b"Total: 1.00".to_vec()),
        UploadFile::new("payload.exe", vec![0x4d, 0x5a]),
        UploadFile::new("", b"nameless".to_vec()),
    ];

    let upload = harness.uploader().upload_batch(&files, "auto").unwrap();

    assert_eq!(upload.uploaded.len(), 2);
    let rejected: Vec<&str> = upload.failed.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(rejected, vec!["notes.txt", "payload.exe"]);
    assert_eq!(upload.uploaded[0].expected_type, "invoice");
    assert_eq!(upload.uploaded[1].expected_type, "receipt");
    assert!(upload.uploaded.iter().all(|d| !d.type_mismatch));

    let job = batch_repo::find_by_batch_id(&harness.db, &upload.batch_id)
        .unwrap()
        .unwrap();
    assert_eq!(job.status, BatchStatus::Queued);
    assert_eq!(job.total_documents, 2);

    for document in document_repo::find_by_batch(&harness.db, &upload.batch_id).unwrap() {
        assert_eq!(document.processing_mode, ProcessingMode::Multiple);
        assert_eq!(document.status, DocumentStatus::Uploaded);
    }
}

#[test]
fn test_status_view_after_run() {
    let harness = TestHarness::new();
    let upload = harness
        .uploader()
        .upload_batch(&three_receipts(), "receipt")
        .unwrap();
    harness
        .coordinator()
        .run(&upload.batch_id, &NoopProgress)
        .unwrap();

    let job = batch_repo::find_by_batch_id(&harness.db, &upload.batch_id)
        .unwrap()
        .unwrap();
    let view = BatchStatusView::from(&job);

    assert_eq!(view.batch_id, upload.batch_id);
    assert_eq!(view.status, BatchStatus::Completed);
    assert_eq!((view.total, view.completed, view.failed), (3, 3, 0));
    assert_eq!(view.progress, 100.0);
}

#[test]
fn test_worker_pool_streams_progress() {
    let harness = TestHarness::new();
    let upload = harness
        .uploader()
        .upload_batch(&three_receipts(), "receipt")
        .unwrap();

    let broadcaster = ProgressBroadcaster::new(64);
    let mut rx = broadcaster.subscribe();
    let reporter: Arc<dyn ProgressReporter> = Arc::new(broadcaster);
    let pool = BatchWorkerPool::new(Arc::new(harness.coordinator()), reporter, 2);

    pool.submit(&upload.batch_id).unwrap();
    let run = pool.recv_result().unwrap();
    pool.wait();

    assert_eq!(run.batch_id, upload.batch_id);
    assert_eq!(run.result.unwrap().status, BatchStatus::Completed);

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.batch_id.as_deref(), Some(upload.batch_id.as_str()));
        kinds.push(event.kind);
    }
    assert!(matches!(kinds.first(), Some(ProgressKind::BatchStarted { total: 3 })));
    assert!(matches!(
        kinds.last(),
        Some(ProgressKind::BatchFinished {
            status: BatchStatus::Completed,
            ..
        })
    ));
    let started = kinds
        .iter()
        .filter(|k| matches!(k, ProgressKind::DocumentStarted { .. }))
        .count();
    assert_eq!(started, 3);
}
