//! Semantic Mutalyzer Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
//!
//! Ambient plumbing shared by the semmut workspace members:
//!
//! - **Logging**: `tracing` subscriber setup from a [`logging::LogConfig`]
//! - **Error Handling**: [`SemmutError`] for setup failures

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, SemmutError};
