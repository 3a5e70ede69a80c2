//! Saving uploaded files and registering them as documents.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::catalog::TypeCatalog;
use crate::classifier::{extension_of, Classifier};
use crate::db::{batch_repo, document_repo, Database};
use crate::error::UploadError;
use crate::model::{Document, NewDocument, ProcessingMode};
use crate::processor::mime;
use crate::sanitize;

/// Expected type meaning "use whatever the classifier detects".
pub const AUTO_TYPE: &str = "auto";

const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// One file as received from a client.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Reads a local file, keeping only its file name as the upload name.
    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let bytes = std::fs::read(path).map_err(|e| UploadError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::new(sanitize::redact_path(path), bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedDocument {
    pub document_id: i64,
    pub filename: String,
    pub expected_type: String,
    pub detected_type: Option<String>,
    pub type_mismatch: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedUpload {
    pub filename: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchUpload {
    pub batch_id: String,
    pub uploaded: Vec<UploadedDocument>,
    pub failed: Vec<FailedUpload>,
}

/// Stores uploads on disk and creates their `documents` rows.
pub struct Uploader {
    db: Database,
    catalog: Arc<TypeCatalog>,
    classifier: Classifier,
    upload_dir: PathBuf,
    max_bytes: u64,
}

impl Uploader {
    pub fn new(
        db: Database,
        catalog: Arc<TypeCatalog>,
        upload_dir: impl Into<PathBuf>,
        max_bytes: u64,
    ) -> Self {
        Self {
            db,
            classifier: Classifier::new(Arc::clone(&catalog)),
            catalog,
            upload_dir: upload_dir.into(),
            max_bytes,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Saves one file and records it in `uploaded` state.
    ///
    /// The stored name is the sanitised original name with a Unix timestamp
    /// suffix. The type is detected from the original filename, and
    /// `type_mismatch` is set when it differs from `expected_type`.
    pub fn save_document(
        &self,
        file: &UploadFile,
        expected_type: &str,
        mode: ProcessingMode,
        batch_id: Option<&str>,
    ) -> Result<Document, UploadError> {
        let size = file.bytes.len() as u64;
        if size > self.max_bytes {
            return Err(UploadError::TooLarge {
                filename: file.filename.clone(),
                size,
                limit: self.max_bytes,
            });
        }

        std::fs::create_dir_all(&self.upload_dir).map_err(|e| UploadError::CreateDirectory {
            path: self.upload_dir.clone(),
            source: e,
        })?;

        let (stored_name, stored_path) = self.write_unique(&file.filename, &file.bytes)?;

        let file_hash = hex::encode(Sha256::digest(&file.bytes));
        let mime_type = mime_guess::from_path(&stored_name)
            .first_raw()
            .unwrap_or(mime::OCTET_STREAM)
            .to_string();

        let detection = self.classifier.detect(&file.filename, "");
        let type_mismatch = detection.type_key != expected_type;

        let new_document = NewDocument {
            filename: stored_name,
            original_filename: file.filename.clone(),
            file_path: stored_path.to_string_lossy().to_string(),
            file_size: size as i64,
            file_hash,
            mime_type,
            expected_type: expected_type.to_string(),
            detected_type: Some(detection.type_key),
            type_mismatch,
            processing_mode: mode,
            batch_id: batch_id.map(str::to_string),
        };

        match document_repo::insert(&self.db, &new_document) {
            Ok(document) => {
                info!(
                    document_id = document.id,
                    filename = %document.filename,
                    type_mismatch,
                    "Document uploaded"
                );
                Ok(document)
            }
            Err(e) => {
                if let Err(remove_err) = std::fs::remove_file(&stored_path) {
                    warn!("Could not remove orphaned upload: {}", remove_err);
                }
                Err(e.into())
            }
        }
    }

    /// Saves a group of files under a new batch in `queued` state.
    ///
    /// Empty filenames are skipped. Files no catalog type accepts, by
    /// extension or guessed MIME type, are reported as failed uploads, as are
    /// files that fail to save. With `expected_type == "auto"` each document
    /// takes its detected type. The batch total is the number stored.
    pub fn upload_batch(
        &self,
        files: &[UploadFile],
        expected_type: &str,
    ) -> Result<BatchUpload, UploadError> {
        if files.is_empty() {
            return Err(UploadError::NoFiles);
        }

        let batch_id = uuid::Uuid::new_v4().to_string();
        batch_repo::insert(&self.db, &batch_id, files.len() as i64)?;

        let mut uploaded = Vec::new();
        let mut failed = Vec::new();

        for file in files {
            if file.filename.is_empty() {
                continue;
            }

            let extension = extension_of(&file.filename);
            let guessed_mime = mime_guess::from_path(&file.filename)
                .first_raw()
                .unwrap_or("");
            if !self.catalog.is_supported(&extension, guessed_mime) {
                debug!(filename = %file.filename, "Skipping unsupported file");
                failed.push(FailedUpload {
                    filename: file.filename.clone(),
                    error: UploadError::UnsupportedType(file.filename.clone()).to_string(),
                });
                continue;
            }

            let document_type = if expected_type == AUTO_TYPE {
                self.classifier.detect(&file.filename, "").type_key
            } else {
                expected_type.to_string()
            };

            match self.save_document(file, &document_type, ProcessingMode::Multiple, Some(&batch_id)) {
                Ok(document) => uploaded.push(UploadedDocument {
                    document_id: document.id,
                    filename: document.original_filename,
                    expected_type: document.expected_type,
                    detected_type: document.detected_type,
                    type_mismatch: document.type_mismatch,
                }),
                Err(e) => failed.push(FailedUpload {
                    filename: file.filename.clone(),
                    error: e.to_string(),
                }),
            }
        }

        batch_repo::set_total(&self.db, &batch_id, uploaded.len() as i64)?;
        info!(
            batch_id = %batch_id,
            uploaded = uploaded.len(),
            failed = failed.len(),
            "Batch uploaded"
        );

        Ok(BatchUpload {
            batch_id,
            uploaded,
            failed,
        })
    }

    /// Writes `bytes` under a fresh name, never overwriting an existing file.
    fn write_unique(&self, original: &str, bytes: &[u8]) -> Result<(String, PathBuf), UploadError> {
        let secure = sanitize::secure_filename(original);
        let secure = if secure.is_empty() {
            "document".to_string()
        } else {
            secure
        };

        let as_path = Path::new(&secure);
        let stem = as_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        let extension = as_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let timestamp = Utc::now().timestamp();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}_{}{}", stem, timestamp, extension)
            } else {
                format!("{}_{}_{}{}", stem, timestamp, attempt, extension)
            };
            let path = self.upload_dir.join(&name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut out) => {
                    write_or_remove(&path, move || {
                        out.write_all(bytes)?;
                        out.sync_all()
                    })?;
                    return Ok((name, path));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(UploadError::WriteFile { path, source: e }),
            }
        }

        Err(UploadError::FileExists(self.upload_dir.join(format!(
            "{}_{}{}",
            stem, timestamp, extension
        ))))
    }
}

/// Fills a freshly created file; a failed write leaves no partial file behind.
fn write_or_remove(
    path: &Path,
    write: impl FnOnce() -> std::io::Result<()>,
) -> Result<(), UploadError> {
    write().map_err(|source| {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), "Could not remove partial upload: {}", e);
        }
        UploadError::WriteFile {
            path: path.to_path_buf(),
            source,
        }
    })
}
