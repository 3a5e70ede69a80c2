//! Aggregate processing statistics over the `documents` table.

use std::collections::BTreeMap;

use rusqlite::params;
use serde::Serialize;

use super::{Database, DatabaseError};
use crate::model::{round2, DocumentStatus};

/// Outcome counts for one document type, keyed by expected type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeCounts {
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingStats {
    pub document_stats: BTreeMap<String, TypeCounts>,
    /// Seconds, averaged over completed documents.
    pub avg_processing_time: f64,
    pub avg_confidence: f64,
}

/// Computes per-type completed/failed counts for every key in `type_keys`
/// plus averages over all completed documents. Averages are 0 when nothing
/// has completed yet.
pub fn summarize<'a, I>(db: &Database, type_keys: I) -> Result<ProcessingStats, DatabaseError>
where
    I: IntoIterator<Item = &'a str>,
{
    db.with_conn(|conn| {
        let mut document_stats = BTreeMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT
                   COALESCE(SUM(CASE WHEN status = ?2 THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = ?3 THEN 1 ELSE 0 END), 0)
                 FROM documents WHERE expected_type = ?1",
            )?;
            for key in type_keys {
                let counts = stmt.query_row(
                    params![
                        key,
                        DocumentStatus::Completed.as_str(),
                        DocumentStatus::Failed.as_str()
                    ],
                    |r| {
                        Ok(TypeCounts {
                            completed: r.get(0)?,
                            failed: r.get(1)?,
                        })
                    },
                )?;
                document_stats.insert(key.to_string(), counts);
            }
        }

        let (avg_time, avg_conf): (f64, f64) = conn.query_row(
            "SELECT COALESCE(AVG(COALESCE(processing_time, 0)), 0),
                    COALESCE(AVG(COALESCE(confidence_score, 0)), 0)
             FROM documents WHERE status = ?1",
            params![DocumentStatus::Completed.as_str()],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        Ok(ProcessingStats {
            document_stats,
            avg_processing_time: round2(avg_time),
            avg_confidence: round2(avg_conf),
        })
    })
}
