use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Batch '{0}' not found")]
    NotFound(String),

    #[error("Batch '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Batch worker pool is shut down")]
    PoolClosed,

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}
