//! Semantic Mutalyzer Server Library
//!
//! REST gateway in front of the Mutalyzer SOAP web service. Results are
//! served as JSON or, on request, as RDF Turtle.
//!
//! # Request pipeline
//!
//! 1. The router is built from the schema document ([`schema`]); every
//!    path/method pair names an operation from the closed table in
//!    [`operations`].
//! 2. The dispatcher ([`api::dispatch`]) collects the declared parameters and
//!    negotiates the output format from the `Accept` header.
//! 3. The operation calls the upstream service once ([`upstream`]), which
//!    flattens the result envelope and fails on error-level messages.
//! 4. The result is rendered ([`render`]): JSON as is, Turtle through the
//!    operation's template.
//!
//! Every failure along the way leaves through the error chain ([`error`]),
//! so clients always see `{status, message, info?, code?}`.
//!
//! # Example
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//! use semmut_server::{api, config::{Config, ConfigOverrides}, upstream::SoapClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Path::new("config.json"), &ConfigOverrides::default())?;
//!     let client = SoapClient::new(&config.upstream)?;
//!     api::serve(config, Arc::new(client)).await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod operations;
pub mod render;
pub mod schema;
pub mod upstream;

// Re-export commonly used types
pub use error::{AppError, AppResult};
