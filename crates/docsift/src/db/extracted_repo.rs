//! Extracted-data repository. A document has at most one row here.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, get_json, get_parsed, get_timestamp};
use super::{Database, DatabaseError};
use crate::model::{ExtractedData, ExtractionMethod, StructuredData};

impl ExtractedData {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            document_id: row.get("document_id")?,
            structured_data: get_json(row, "structured_data")?,
            raw_text: row.get("raw_text")?,
            extraction_method: get_parsed(row, "extraction_method")?,
            confidence_score: row.get("confidence_score")?,
            created_at: get_timestamp(row, "created_at")?,
            updated_at: get_timestamp(row, "updated_at")?,
        })
    }
}

/// Creates or replaces the extracted data of a document.
///
/// A second call for the same document keeps the original `created_at`
/// and bumps `updated_at`.
pub fn upsert(
    db: &Database,
    document_id: i64,
    structured_data: &StructuredData,
    raw_text: &str,
    method: ExtractionMethod,
    confidence_score: f64,
) -> Result<ExtractedData, DatabaseError> {
    let json = serde_json::to_string(structured_data).map_err(|e| DatabaseError::Json {
        column: "structured_data",
        source: e,
    })?;
    let now = format_timestamp(&Utc::now());

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO extracted_data (document_id, structured_data, raw_text,
             extraction_method, confidence_score, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(document_id) DO UPDATE SET
               structured_data = excluded.structured_data,
               raw_text = excluded.raw_text,
               extraction_method = excluded.extraction_method,
               confidence_score = excluded.confidence_score,
               updated_at = excluded.updated_at",
            params![
                document_id,
                json,
                raw_text,
                method.as_str(),
                confidence_score,
                now
            ],
        )?;

        let row = conn.query_row(
            "SELECT * FROM extracted_data WHERE document_id = ?1",
            params![document_id],
            ExtractedData::from_row,
        )?;
        Ok(row)
    })
}

pub fn find_by_document(
    db: &Database,
    document_id: i64,
) -> Result<Option<ExtractedData>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM extracted_data WHERE document_id = ?1",
                params![document_id],
                ExtractedData::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::document_repo;
    use crate::model::{NewDocument, ProcessingMode};
    use serde_json::{json, Value};

    fn db_with_document() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let doc = document_repo::insert(
            &db,
            &NewDocument {
                filename: "r.png".to_string(),
                original_filename: "r.png".to_string(),
                file_path: "/tmp/r.png".to_string(),
                file_size: 10,
                file_hash: "00".repeat(32),
                mime_type: "image/png".to_string(),
                expected_type: "receipt".to_string(),
                detected_type: Some("receipt".to_string()),
                type_mismatch: false,
                processing_mode: ProcessingMode::Simple,
                batch_id: None,
            },
        )
        .unwrap();
        (db, doc.id)
    }

    #[test]
    fn test_upsert_creates_then_replaces() {
        let (db, doc_id) = db_with_document();

        let mut first = StructuredData::new();
        first.insert("total_amount".to_string(), json!("12.50"));
        first.insert("date".to_string(), Value::Null);
        let created = upsert(&db, doc_id, &first, "RECEIPT", ExtractionMethod::Template, 90.0)
            .unwrap();
        assert_eq!(created.structured_data, first);
        assert_eq!(created.extraction_method, ExtractionMethod::Template);

        let mut second = StructuredData::new();
        second.insert("total_amount".to_string(), json!("13.00"));
        let replaced =
            upsert(&db, doc_id, &second, "RECEIPT v2", ExtractionMethod::Ai, 95.0).unwrap();

        assert_eq!(replaced.id, created.id);
        assert_eq!(replaced.created_at, created.created_at);
        assert_eq!(replaced.raw_text, "RECEIPT v2");
        assert_eq!(replaced.extraction_method, ExtractionMethod::Ai);
        assert_eq!(replaced.structured_data, second);

        let count: u32 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM extracted_data", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_find_by_document() {
        let (db, doc_id) = db_with_document();
        assert!(find_by_document(&db, doc_id).unwrap().is_none());

        upsert(&db, doc_id, &StructuredData::new(), "", ExtractionMethod::Template, 85.0)
            .unwrap();
        let found = find_by_document(&db, doc_id).unwrap().unwrap();
        assert!(found.structured_data.is_empty());
        assert_eq!(found.confidence_score, 85.0);
    }

    #[test]
    fn test_upsert_for_missing_document_fails() {
        let db = Database::open_in_memory().unwrap();
        let result = upsert(&db, 77, &StructuredData::new(), "", ExtractionMethod::Ai, 90.0);
        assert!(matches!(result, Err(DatabaseError::Sqlite(_))));
    }
}
