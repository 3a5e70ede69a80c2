//! Real-time progress streaming for documents and batches.
//!
//! Events fan out over a `tokio::sync::broadcast` channel so any front end
//! can subscribe without the pipeline knowing who listens.

pub mod progress;

pub use progress::{ProgressBroadcaster, ProgressEvent, ProgressKind};
