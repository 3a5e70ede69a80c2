//! Batch job repository: the `batch_jobs` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, get_opt_json, get_opt_timestamp, get_parsed, get_timestamp};
use super::{Database, DatabaseError};
use crate::model::{BatchJob, BatchStatus, ResultsSummary};

impl BatchJob {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            batch_id: row.get("batch_id")?,
            total_documents: row.get("total_documents")?,
            completed_documents: row.get("completed_documents")?,
            failed_documents: row.get("failed_documents")?,
            processing_documents: row.get("processing_documents")?,
            status: get_parsed(row, "status")?,
            progress_percentage: row.get("progress_percentage")?,
            created_at: get_timestamp(row, "created_at")?,
            started_at: get_opt_timestamp(row, "started_at")?,
            completed_at: get_opt_timestamp(row, "completed_at")?,
            results_summary: get_opt_json(row, "results_summary")?,
        })
    }
}

/// Creates a `queued` batch.
pub fn insert(db: &Database, batch_id: &str, total: i64) -> Result<BatchJob, DatabaseError> {
    let created_at = format_timestamp(&Utc::now());
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO batch_jobs (batch_id, total_documents, status, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![batch_id, total, BatchStatus::Queued.as_str(), created_at],
        )?;
        let row = conn.query_row(
            "SELECT * FROM batch_jobs WHERE id = ?1",
            params![conn.last_insert_rowid()],
            BatchJob::from_row,
        )?;
        Ok(row)
    })
}

pub fn find_by_batch_id(db: &Database, batch_id: &str) -> Result<Option<BatchJob>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM batch_jobs WHERE batch_id = ?1",
                params![batch_id],
                BatchJob::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists batches newest first, returning (rows, total_count).
pub fn list(
    db: &Database,
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<(Vec<BatchJob>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let total: u64 = conn.query_row("SELECT COUNT(*) FROM batch_jobs", [], |r| r.get(0))?;
        let mut stmt = conn.prepare(
            "SELECT * FROM batch_jobs ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
            .query_map(
                params![limit.unwrap_or(100) as i64, offset.unwrap_or(0) as i64],
                BatchJob::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((rows, total))
    })
}

/// Sets the document count recorded at upload time.
pub fn set_total(db: &Database, batch_id: &str, total: i64) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE batch_jobs SET total_documents = ?2 WHERE batch_id = ?1",
            params![batch_id, total],
        )?;
        Ok(())
    })
}

/// Starts a run: `processing`, counters reset, every document in flight.
///
/// Returns `false` without touching the row when the batch is missing or
/// already `processing`, so two runners can never drive the same batch.
pub fn mark_started(
    db: &Database,
    batch_id: &str,
    total: i64,
    started_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE batch_jobs SET status = ?2, started_at = ?3, total_documents = ?4,
             completed_documents = 0, failed_documents = 0, processing_documents = ?4,
             progress_percentage = 0, completed_at = NULL, results_summary = NULL
             WHERE batch_id = ?1 AND status != ?2",
            params![
                batch_id,
                BatchStatus::Processing.as_str(),
                format_timestamp(&started_at),
                total
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Persists running counts after one document has been attempted.
pub fn update_progress(
    db: &Database,
    batch_id: &str,
    completed: i64,
    failed: i64,
    processing: i64,
    progress: f64,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE batch_jobs SET completed_documents = ?2, failed_documents = ?3,
             processing_documents = ?4, progress_percentage = ?5
             WHERE batch_id = ?1",
            params![batch_id, completed, failed, processing, progress],
        )?;
        Ok(())
    })
}

/// Finishes a run with its summary; progress becomes 100.
pub fn mark_completed(
    db: &Database,
    batch_id: &str,
    completed_at: DateTime<Utc>,
    summary: &ResultsSummary,
) -> Result<(), DatabaseError> {
    let json = serde_json::to_string(summary).map_err(|e| DatabaseError::Json {
        column: "results_summary",
        source: e,
    })?;
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE batch_jobs SET status = ?2, completed_at = ?3, progress_percentage = 100,
             completed_documents = ?4, failed_documents = ?5, processing_documents = 0,
             results_summary = ?6
             WHERE batch_id = ?1",
            params![
                batch_id,
                BatchStatus::Completed.as_str(),
                format_timestamp(&completed_at),
                summary.completed,
                summary.failed,
                json
            ],
        )?;
        Ok(())
    })
}

/// Marks a run as aborted by a coordinator-level fault. Counters are kept.
pub fn mark_failed(
    db: &Database,
    batch_id: &str,
    completed_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE batch_jobs SET status = ?2, completed_at = ?3 WHERE batch_id = ?1",
            params![
                batch_id,
                BatchStatus::Failed.as_str(),
                format_timestamp(&completed_at)
            ],
        )?;
        Ok(())
    })
}
