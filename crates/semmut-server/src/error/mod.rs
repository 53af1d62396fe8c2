//! Request-time error types
//!
//! Every failure while serving a request is an [`AppError`]. It is never
//! turned into a response directly: the [`ErrorChain`] normalizes it into a
//! [`NormalizedError`] first, so clients always see the same wire shape:
//!
//! ```json
//! { "status": 400, "message": "Reference not found", "code": "EREF" }
//! ```

pub mod chain;
pub mod normalize;

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::render::RenderError;
use crate::upstream::{UpstreamError, UpstreamMessage};

pub use chain::{ErrorChain, ErrorStage};
pub use normalize::{normalize, parse_validation_message, NormalizedError, GENERIC_ERROR_MESSAGE};

/// Result type alias for request handling
pub type AppResult<T> = std::result::Result<T, AppError>;

/// HTTP status used for fatal messages reported by the upstream service.
pub const DOMAIN_ERROR_STATUS: StatusCode = StatusCode::BAD_REQUEST;

/// A fatal message reported by the upstream service for a well-formed request
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{code}: {message}")]
pub struct DomainError {
    pub status: u16,
    pub code: String,
    pub message: String,
}

impl From<&UpstreamMessage> for DomainError {
    fn from(msg: &UpstreamMessage) -> Self {
        Self {
            status: DOMAIN_ERROR_STATUS.as_u16(),
            code: msg.errorcode.clone(),
            message: msg.message.clone(),
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Request validation failure, worded as `"<status> Error: <text>"`
    #[error("{0}")]
    Validation(String),

    #[error("Upstream call failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("Handler panicked: {0}")]
    Panic(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Required parameter absent from the request
    pub fn missing_parameter(location: &str, name: &str) -> Self {
        Self::Validation(format!(
            "400 Error: Missing required {location} parameter \"{name}\""
        ))
    }

    /// Nothing in the `Accept` header can be produced by the operation
    pub fn not_acceptable(accept: &str, produces: &[&str]) -> Self {
        Self::Validation(format!(
            "406 Error: Accept header \"{accept}\" does not match any of the producible types\nproduces: {}",
            produces.join(", ")
        ))
    }

    /// No route matches the request path
    pub fn not_found(path: &str) -> Self {
        Self::Validation(format!("404 Error: Resource not found: {path}"))
    }

    /// The path exists but not for this method
    pub fn method_not_allowed(method: &str, path: &str) -> Self {
        Self::Validation(format!("405 Error: Method not allowed: {method} {path}"))
    }

    /// Short classification used in logs and in `originalError`
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Domain(_) => "domain",
            AppError::Validation(_) => "validation",
            AppError::Upstream(_) => "upstream",
            AppError::Render(_) => "render",
            AppError::Panic(_) => "panic",
            AppError::Internal(_) => "internal",
        }
    }
}
