use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Document {0} not found")]
    NotFound(i64),

    #[error("Document {0} is already being processed")]
    AlreadyProcessing(i64),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Processing step panicked: {0}")]
    Panicked(String),
}
