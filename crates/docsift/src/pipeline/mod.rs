pub mod error;
pub mod progress;
pub mod runner;

pub use error::PipelineError;
pub use progress::{NoopProgress, ProgressReporter};
pub use runner::{confidence_score, DocumentPipeline, Outcome};
