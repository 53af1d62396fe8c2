//! Error normalization
//!
//! Classifies an [`AppError`] into one of three kinds, first match wins:
//!
//! 1. **Domain**: an upstream fatal message, passed through as-is.
//! 2. **Validation**: text shaped like `"<status> Error: <text>"`, optionally
//!    followed by `key: value` lines, parsed into status, message and info.
//! 3. **Unexpected**: anything else, reported as a generic 500.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use super::{AppError, DomainError};

/// Message sent to clients for every unexpected failure.
pub const GENERIC_ERROR_MESSAGE: &str =
    "An error occurred on the server that we did not expect. Please let us know!";

/// The uniform error shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedError {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Cause of an unexpected error. Logged, never sent to clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_error: Option<Value>,
}

impl NormalizedError {
    /// Generic 500 with no recorded cause
    pub fn unexpected() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            message: GENERIC_ERROR_MESSAGE.to_string(),
            info: None,
            code: None,
            original_error: None,
        }
    }

    /// HTTP status, falling back to 500 when `status` is not a valid code
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// JSON body sent to the client
    pub fn wire_body(&self) -> Value {
        let mut body = json!({
            "status": self.status,
            "message": self.message,
        });
        if let Some(info) = &self.info {
            body["info"] = json!(info);
        }
        if let Some(code) = &self.code {
            body["code"] = json!(code);
        }
        body
    }
}

impl From<DomainError> for NormalizedError {
    fn from(err: DomainError) -> Self {
        Self {
            status: err.status,
            message: err.message,
            info: None,
            code: Some(err.code),
            original_error: None,
        }
    }
}

impl IntoResponse for NormalizedError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.wire_body())).into_response()
    }
}

/// Normalize any request error. Never fails.
pub fn normalize(err: AppError) -> NormalizedError {
    match err {
        AppError::Domain(domain) => domain.into(),
        other => parse_validation_message(&other.to_string()).unwrap_or_else(|| unexpected(&other)),
    }
}

struct Patterns {
    status_line: Regex,
    fragment: Regex,
    property: Regex,
    quoted: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            status_line: Regex::new(r"^(\d{3}) Error:")?,
            fragment: Regex::new(r"\d{3} Error: (.*)")?,
            property: Regex::new(r#"^(.*?): \s*"?([^"]*)"?\s*"#)?,
            quoted: Regex::new(r#""([\w\-\s]+?)""#)?,
        })
    }
}

static PATTERNS: LazyLock<Option<Patterns>> = LazyLock::new(|| Patterns::compile().ok());

/// Parse `"<status> Error: <text>"` plus trailing `key: value` lines.
///
/// Returns `None` when the first line does not carry a status prefix.
pub fn parse_validation_message(text: &str) -> Option<NormalizedError> {
    let patterns = PATTERNS.as_ref()?;
    let status: u16 = patterns
        .status_line
        .captures(text)?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;
    // the body status must be the one sent on the wire
    let status = StatusCode::from_u16(status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        .as_u16();

    let mut messages = Vec::new();
    let mut info = BTreeMap::new();

    for line in text.lines() {
        if let Some(fragment) = patterns.fragment.captures(line).and_then(|c| c.get(1)) {
            // single quotes read better inside a JSON string
            let message = patterns.quoted.replace_all(fragment.as_str(), "'${1}'");
            messages.push(message.into_owned());
            continue;
        }
        if let Some(caps) = patterns.property.captures(line) {
            if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
                info.insert(key.as_str().trim().to_string(), value.as_str().trim().to_string());
            }
        }
    }

    Some(NormalizedError {
        status,
        message: messages.join(" "),
        info: Some(info),
        code: None,
        original_error: None,
    })
}

fn unexpected(err: &AppError) -> NormalizedError {
    let mut causes = Vec::new();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }

    NormalizedError {
        original_error: Some(json!({
            "kind": err.kind(),
            "error": err.to_string(),
            "causes": causes,
        })),
        ..NormalizedError::unexpected()
    }
}
