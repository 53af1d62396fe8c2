//! Error types shared by the semmut crates

use thiserror::Error;

/// Result type alias for semmut common operations
pub type Result<T> = std::result::Result<T, SemmutError>;

/// Errors raised while setting up ambient concerns (logging, settings)
#[derive(Error, Debug)]
pub enum SemmutError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {name}: '{value}'")]
    InvalidSetting { name: &'static str, value: String },

    #[error("Failed to install logging subscriber: {0}")]
    Logging(String),
}
