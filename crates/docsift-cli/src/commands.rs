use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context};
use docsift::db::document_repo::DocumentFilter;
use docsift::db::{batch_repo, document_repo, extracted_repo, stats_repo};
use docsift::model::{BatchStatusView, ProcessingMode};
use docsift::pipeline::ProgressReporter;
use docsift::{
    BatchCoordinator, BatchWorkerPool, Config, Database, DocumentPipeline, NoopProgress, Outcome,
    ProgressBroadcaster, TypeCatalog, UploadFile, Uploader,
};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::{BatchCommand, Command};

/// Shared handles every command needs.
struct App {
    config: Config,
    db: Database,
    catalog: Arc<TypeCatalog>,
}

impl App {
    fn open(config: &Config) -> anyhow::Result<Self> {
        let path = config
            .database_path()
            .context("no database path configured and no home directory found")?;
        let db = Database::open(&path)
            .with_context(|| format!("opening database {}", path.display()))?;

        Ok(Self {
            config: config.clone(),
            db,
            catalog: Arc::new(TypeCatalog::builtin()),
        })
    }

    fn uploader(&self) -> Uploader {
        Uploader::new(
            self.db.clone(),
            Arc::clone(&self.catalog),
            &self.config.upload_directory,
            self.config.max_upload_bytes,
        )
    }

    fn pipeline(&self) -> DocumentPipeline {
        DocumentPipeline::from_config(self.db.clone(), Arc::clone(&self.catalog), &self.config)
    }
}

pub fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    if let Command::Types = command {
        return types();
    }

    let app = App::open(config)?;

    match command {
        Command::Upload {
            file,
            expected_type,
        } => upload(&app, file, &expected_type),
        Command::Process { document_id } => process(&app, document_id),
        Command::Show { document_id } => show(&app, document_id),
        Command::List {
            status,
            expected_type,
            mode,
            batch,
            limit,
            offset,
        } => {
            let filter = DocumentFilter {
                status,
                expected_type,
                processing_mode: mode,
                batch_id: batch,
                limit: Some(limit),
                offset: Some(offset),
            };
            let (documents, total) = document_repo::query(&app.db, &filter)?;
            print_json(&json!({ "documents": documents, "total": total }))
        }
        Command::Batch { command } => batch(&app, command),
        Command::Stats => {
            let stats = stats_repo::summarize(&app.db, app.catalog.keys())?;
            print_json(&stats)
        }
        Command::Types => types(),
    }
}

fn types() -> anyhow::Result<()> {
    let catalog = TypeCatalog::builtin();
    let types: Vec<_> = catalog
        .iter()
        .map(|(key, def)| {
            json!({
                "key": key,
                "name": def.name,
                "extensions": def.extensions,
                "fields": def.field_names().collect::<Vec<_>>(),
                "confidence_threshold": def.confidence_threshold,
            })
        })
        .collect();
    print_json(&types)
}

fn upload(app: &App, file: PathBuf, expected_type: &str) -> anyhow::Result<()> {
    if !app.catalog.contains(expected_type) {
        bail!("unknown document type '{}'", expected_type);
    }

    let upload = UploadFile::from_path(&file)?;
    let document = app
        .uploader()
        .save_document(&upload, expected_type, ProcessingMode::Simple, None)?;

    if document.type_mismatch {
        warn!(
            expected = %document.expected_type,
            detected = ?document.detected_type,
            "Detected type differs from the expected type"
        );
    }
    print_json(&document)
}

fn process(app: &App, document_id: i64) -> anyhow::Result<()> {
    let outcome = app.pipeline().process(document_id, &NoopProgress)?;

    match outcome {
        Outcome::Completed {
            document,
            extracted,
        } => print_json(&json!({ "document": document, "extracted_data": extracted })),
        Outcome::Failed { document, error } => {
            print_json(&json!({ "document": document, "error": error }))
        }
    }
}

fn show(app: &App, document_id: i64) -> anyhow::Result<()> {
    let document = document_repo::find_by_id(&app.db, document_id)?
        .with_context(|| format!("document {} not found", document_id))?;
    let extracted = extracted_repo::find_by_document(&app.db, document_id)?;

    print_json(&json!({ "document": document, "extracted_data": extracted }))
}

fn batch(app: &App, command: BatchCommand) -> anyhow::Result<()> {
    match command {
        BatchCommand::Upload {
            files,
            expected_type,
        } => {
            if expected_type != docsift::upload::AUTO_TYPE && !app.catalog.contains(&expected_type)
            {
                bail!("unknown document type '{}'", expected_type);
            }

            let uploads = files
                .iter()
                .map(|path| UploadFile::from_path(path))
                .collect::<Result<Vec<_>, _>>()?;
            let result = app.uploader().upload_batch(&uploads, &expected_type)?;

            info!(
                batch_id = %result.batch_id,
                uploaded = result.uploaded.len(),
                failed = result.failed.len(),
                "Batch uploaded"
            );
            print_json(&result)
        }
        BatchCommand::Run {
            batch_ids,
            progress,
        } => run_batches(app, batch_ids, progress),
        BatchCommand::Status { batch_id } => {
            let job = batch_repo::find_by_batch_id(&app.db, &batch_id)?
                .with_context(|| format!("batch {} not found", batch_id))?;
            print_json(&BatchStatusView::from(&job))
        }
        BatchCommand::List { limit, offset } => {
            let (batches, total) = batch_repo::list(&app.db, Some(limit), Some(offset))?;
            print_json(&json!({ "batches": batches, "total": total }))
        }
    }
}

fn run_batches(app: &App, batch_ids: Vec<String>, show_progress: bool) -> anyhow::Result<()> {
    let broadcaster = ProgressBroadcaster::default();
    let printer = show_progress.then(|| {
        let mut rx = broadcaster.subscribe();
        thread::spawn(move || loop {
            match rx.blocking_recv() {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => eprintln!("{}", line),
                    Err(e) => warn!("Could not serialize progress event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Progress output skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        })
    });

    let coordinator = Arc::new(BatchCoordinator::new(Arc::new(app.pipeline())));
    let reporter: Arc<dyn ProgressReporter> = Arc::new(broadcaster);
    let pool = BatchWorkerPool::new(coordinator, reporter, app.config.worker_count);

    let mut submitted = 0;
    for batch_id in &batch_ids {
        match pool.submit(batch_id) {
            Ok(()) => submitted += 1,
            Err(e) => warn!(batch_id = %batch_id, "Batch not submitted: {}", e),
        }
    }

    let mut results = Vec::with_capacity(submitted);
    for _ in 0..submitted {
        let Some(run) = pool.recv_result() else {
            break;
        };
        results.push(match run.result {
            Ok(job) => json!({ "batch_id": run.batch_id, "job": job }),
            Err(error) => json!({ "batch_id": run.batch_id, "error": error }),
        });
    }

    pool.shutdown();
    pool.wait();
    if let Some(handle) = printer {
        if handle.join().is_err() {
            warn!("Progress printer panicked");
        }
    }

    print_json(&results)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{}", out);
    Ok(())
}
