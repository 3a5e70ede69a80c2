//! Domain records persisted by the `db` module.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field name to extracted value (string or `null`).
pub type StructuredData = BTreeMap<String, serde_json::Value>;

/// Error returned when a stored status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseStatusError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum! {
    /// Lifecycle of a single document: `uploaded → processing → {completed | failed}`.
    DocumentStatus, "document status" {
        Uploaded => "uploaded",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

string_enum! {
    ProcessingMode, "processing mode" {
        Simple => "simple",
        Multiple => "multiple",
    }
}

string_enum! {
    /// Which strategy produced a document's structured data.
    ExtractionMethod, "extraction method" {
        Ai => "ai",
        Template => "template",
    }
}

string_enum! {
    /// Lifecycle of a batch: `queued → processing → completed`, or `failed`
    /// when the coordinator itself cannot proceed.
    BatchStatus, "batch status" {
        Queued => "queued",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub uuid: String,
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_hash: String,
    pub mime_type: String,
    pub expected_type: String,
    pub detected_type: Option<String>,
    pub type_mismatch: bool,
    pub processing_mode: ProcessingMode,
    pub status: DocumentStatus,
    pub batch_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub confidence_score: Option<f64>,
    /// Seconds spent extracting text and fields.
    pub processing_time: Option<f64>,
    pub error_message: Option<String>,
}

impl Document {
    pub fn path(&self) -> &Path {
        Path::new(&self.file_path)
    }
}

/// Fields supplied when a document row is first created. Identity,
/// status and timestamps are assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_hash: String,
    pub mime_type: String,
    pub expected_type: String,
    pub detected_type: Option<String>,
    pub type_mismatch: bool,
    pub processing_mode: ProcessingMode,
    pub batch_id: Option<String>,
}

/// Structured output of one processing attempt. At most one per document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    pub id: i64,
    pub document_id: i64,
    pub structured_data: StructuredData,
    /// Bounded prefix of the extracted text, never the full text.
    pub raw_text: String,
    pub extraction_method: ExtractionMethod,
    pub confidence_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate counts written once when a batch run finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
    pub success_rate: f64,
}

impl ResultsSummary {
    pub fn new(total: i64, completed: i64, failed: i64) -> Self {
        let success_rate = if total > 0 {
            round2(completed as f64 / total as f64 * 100.0)
        } else {
            0.0
        };
        Self {
            total,
            completed,
            failed,
            success_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: i64,
    pub batch_id: String,
    pub total_documents: i64,
    pub completed_documents: i64,
    pub failed_documents: i64,
    pub processing_documents: i64,
    pub status: BatchStatus,
    pub progress_percentage: f64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results_summary: Option<ResultsSummary>,
}

/// Read-only projection of a batch for status polling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStatusView {
    pub batch_id: String,
    pub status: BatchStatus,
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
    pub processing: i64,
    pub progress: f64,
}

impl From<&BatchJob> for BatchStatusView {
    fn from(job: &BatchJob) -> Self {
        Self {
            batch_id: job.batch_id.clone(),
            status: job.status,
            total: job.total_documents,
            completed: job.completed_documents,
            failed: job.failed_documents,
            processing: job.processing_documents,
            progress: job.progress_percentage,
        }
    }
}

/// Rounds to two decimal places for display-oriented values.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
