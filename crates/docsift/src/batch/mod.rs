//! Batch runs: sequential processing of every document in a batch, with
//! per-document progress and fault isolation.

pub mod coordinator;
pub mod error;
pub mod pool;

pub use coordinator::BatchCoordinator;
pub use error::BatchError;
pub use pool::{BatchRunResult, BatchWorkerPool};
