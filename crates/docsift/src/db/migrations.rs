//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order, each inside its own transaction.

use rusqlite::Connection;

use super::error::DatabaseError;

/// A single migration definition.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const CREATE_DOCUMENTS: &str = "
CREATE TABLE documents (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid              TEXT NOT NULL UNIQUE,
    filename          TEXT NOT NULL,
    original_filename TEXT NOT NULL,
    file_path         TEXT NOT NULL,
    file_size         INTEGER NOT NULL,
    file_hash         TEXT NOT NULL,
    mime_type         TEXT NOT NULL,
    expected_type     TEXT NOT NULL,
    detected_type     TEXT,
    type_mismatch     INTEGER NOT NULL DEFAULT 0,
    processing_mode   TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'uploaded',
    batch_id          TEXT,
    created_at        TEXT NOT NULL,
    processed_at      TEXT,
    confidence_score  REAL,
    processing_time   REAL,
    error_message     TEXT
);
CREATE INDEX idx_documents_batch_id ON documents(batch_id);
CREATE INDEX idx_documents_status ON documents(status);
";

const CREATE_EXTRACTED_DATA: &str = "
CREATE TABLE extracted_data (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id       INTEGER NOT NULL UNIQUE
                      REFERENCES documents(id) ON DELETE CASCADE,
    structured_data   TEXT NOT NULL,
    raw_text          TEXT NOT NULL DEFAULT '',
    extraction_method TEXT NOT NULL,
    confidence_score  REAL NOT NULL,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);
";

const CREATE_BATCH_JOBS: &str = "
CREATE TABLE batch_jobs (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id             TEXT NOT NULL UNIQUE,
    total_documents      INTEGER NOT NULL,
    completed_documents  INTEGER NOT NULL DEFAULT 0,
    failed_documents     INTEGER NOT NULL DEFAULT 0,
    processing_documents INTEGER NOT NULL DEFAULT 0,
    status               TEXT NOT NULL DEFAULT 'queued',
    progress_percentage  REAL NOT NULL DEFAULT 0,
    created_at           TEXT NOT NULL,
    started_at           TEXT,
    completed_at         TEXT,
    results_summary      TEXT
);
";

const INDEX_DOCUMENTS_EXPECTED_TYPE: &str = "
CREATE INDEX idx_documents_expected_type_status ON documents(expected_type, status);
";

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_documents_table",
        sql: CREATE_DOCUMENTS,
    },
    Migration {
        version: 2,
        description: "create_extracted_data_table",
        sql: CREATE_EXTRACTED_DATA,
    },
    Migration {
        version: 3,
        description: "create_batch_jobs_table",
        sql: CREATE_BATCH_JOBS,
    },
    Migration {
        version: 4,
        description: "index_documents_by_expected_type",
        sql: INDEX_DOCUMENTS_EXPECTED_TYPE,
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;
        tx.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
        tx.commit()?;
    }

    Ok(())
}
