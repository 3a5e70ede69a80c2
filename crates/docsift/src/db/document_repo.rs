//! Document repository: CRUD and state transitions for the `documents` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, get_opt_timestamp, get_parsed, get_timestamp};
use super::{Database, DatabaseError};
use crate::model::{Document, DocumentStatus, NewDocument, ProcessingMode};

impl Document {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            uuid: row.get("uuid")?,
            filename: row.get("filename")?,
            original_filename: row.get("original_filename")?,
            file_path: row.get("file_path")?,
            file_size: row.get("file_size")?,
            file_hash: row.get("file_hash")?,
            mime_type: row.get("mime_type")?,
            expected_type: row.get("expected_type")?,
            detected_type: row.get("detected_type")?,
            type_mismatch: row.get("type_mismatch")?,
            processing_mode: get_parsed(row, "processing_mode")?,
            status: get_parsed(row, "status")?,
            batch_id: row.get("batch_id")?,
            created_at: get_timestamp(row, "created_at")?,
            processed_at: get_opt_timestamp(row, "processed_at")?,
            confidence_score: row.get("confidence_score")?,
            processing_time: row.get("processing_time")?,
            error_message: row.get("error_message")?,
        })
    }
}

/// Query filter parameters for document listing.
#[derive(Debug, Default, Clone)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub expected_type: Option<String>,
    pub processing_mode: Option<ProcessingMode>,
    pub batch_id: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Result of trying to move a document into `processing`.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// The document is now `processing`; carries the updated row.
    Claimed(Document),
    AlreadyProcessing,
    NotFound,
}

/// Inserts a new document in `uploaded` state and returns the stored row.
pub fn insert(db: &Database, doc: &NewDocument) -> Result<Document, DatabaseError> {
    let uuid = uuid::Uuid::new_v4().to_string();
    let created_at = format_timestamp(&Utc::now());

    let id = db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO documents (uuid, filename, original_filename, file_path, file_size,
             file_hash, mime_type, expected_type, detected_type, type_mismatch,
             processing_mode, status, batch_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                uuid,
                doc.filename,
                doc.original_filename,
                doc.file_path,
                doc.file_size,
                doc.file_hash,
                doc.mime_type,
                doc.expected_type,
                doc.detected_type,
                doc.type_mismatch,
                doc.processing_mode.as_str(),
                DocumentStatus::Uploaded.as_str(),
                doc.batch_id,
                created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })?;

    find_by_id(db, id)?.ok_or(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
}

/// Overwrites every mutable column of an existing document.
pub fn update(db: &Database, doc: &Document) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE documents SET filename=?2, original_filename=?3, file_path=?4,
             file_size=?5, file_hash=?6, mime_type=?7, expected_type=?8, detected_type=?9,
             type_mismatch=?10, processing_mode=?11, status=?12, batch_id=?13,
             processed_at=?14, confidence_score=?15, processing_time=?16, error_message=?17
             WHERE id=?1",
            params![
                doc.id,
                doc.filename,
                doc.original_filename,
                doc.file_path,
                doc.file_size,
                doc.file_hash,
                doc.mime_type,
                doc.expected_type,
                doc.detected_type,
                doc.type_mismatch,
                doc.processing_mode.as_str(),
                doc.status.as_str(),
                doc.batch_id,
                doc.processed_at.as_ref().map(format_timestamp),
                doc.confidence_score,
                doc.processing_time,
                doc.error_message,
            ],
        )?;
        Ok(())
    })
}

/// Finds a document by its numeric id.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<Document>, DatabaseError> {
    db.with_conn(|conn| {
        let doc = conn
            .query_row(
                "SELECT * FROM documents WHERE id = ?1",
                params![id],
                Document::from_row,
            )
            .optional()?;
        Ok(doc)
    })
}

/// Finds a document by its external uuid.
pub fn find_by_uuid(db: &Database, uuid: &str) -> Result<Option<Document>, DatabaseError> {
    db.with_conn(|conn| {
        let doc = conn
            .query_row(
                "SELECT * FROM documents WHERE uuid = ?1",
                params![uuid],
                Document::from_row,
            )
            .optional()?;
        Ok(doc)
    })
}

/// All documents of a batch in insertion order.
pub fn find_by_batch(db: &Database, batch_id: &str) -> Result<Vec<Document>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM documents WHERE batch_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![batch_id], Document::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Queries documents with filters, newest first, returning (rows, total_count).
pub fn query(
    db: &Database,
    filter: &DocumentFilter,
) -> Result<(Vec<Document>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.as_str()));
        }
        if let Some(ref expected_type) = filter.expected_type {
            conditions.push(format!("expected_type = ?{}", param_values.len() + 1));
            param_values.push(Box::new(expected_type.clone()));
        }
        if let Some(mode) = filter.processing_mode {
            conditions.push(format!("processing_mode = ?{}", param_values.len() + 1));
            param_values.push(Box::new(mode.as_str()));
        }
        if let Some(ref batch_id) = filter.batch_id {
            conditions.push(format!("batch_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(batch_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM documents {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM documents {} ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<Document> = stmt
            .query_map(params_ref.as_slice(), Document::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Atomically moves a document into `processing` unless it is already there.
///
/// The check and the write happen in one transaction, so two concurrent
/// callers can never both claim the same document. Any previous error
/// message is cleared.
pub fn claim_for_processing(db: &Database, id: i64) -> Result<Claim, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;

        let changed = tx.execute(
            "UPDATE documents SET status = ?2, error_message = NULL
             WHERE id = ?1 AND status != ?2",
            params![id, DocumentStatus::Processing.as_str()],
        )?;

        let claim = if changed == 1 {
            let doc = tx.query_row(
                "SELECT * FROM documents WHERE id = ?1",
                params![id],
                Document::from_row,
            )?;
            Claim::Claimed(doc)
        } else {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?1)",
                params![id],
                |r| r.get(0),
            )?;
            if exists {
                Claim::AlreadyProcessing
            } else {
                Claim::NotFound
            }
        };

        tx.commit()?;
        Ok(claim)
    })
}

/// Records a successful processing attempt.
pub fn mark_completed(
    db: &Database,
    id: i64,
    processed_at: DateTime<Utc>,
    confidence_score: f64,
    processing_time: f64,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE documents SET status = ?2, processed_at = ?3, confidence_score = ?4,
             processing_time = ?5, error_message = NULL
             WHERE id = ?1",
            params![
                id,
                DocumentStatus::Completed.as_str(),
                format_timestamp(&processed_at),
                confidence_score,
                processing_time,
            ],
        )?;
        Ok(())
    })
}

/// Records a failed processing attempt.
///
/// Confidence, duration and processed timestamp are cleared, and extracted
/// data left over from an earlier successful attempt is removed, so a failed
/// document never carries results.
pub fn mark_failed(db: &Database, id: i64, error_message: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE documents SET status = ?2, error_message = ?3, processed_at = NULL,
             confidence_score = NULL, processing_time = NULL
             WHERE id = ?1",
            params![id, DocumentStatus::Failed.as_str(), error_message],
        )?;
        tx.execute(
            "DELETE FROM extracted_data WHERE document_id = ?1",
            params![id],
        )?;
        tx.commit()?;
        Ok(())
    })
}

/// Counts documents with the given status.
pub fn count_by_status(db: &Database, status: DocumentStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
