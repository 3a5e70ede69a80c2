//! Shared test utilities for docsift integration tests.
//!
//! - `TestHarness` gives each test its own upload directory and database
//! - `builders` produces small PDF, DOCX and CSV files in memory

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
