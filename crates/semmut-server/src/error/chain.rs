//! Error propagation chain
//!
//! Every request error runs through the same ordered stages:
//!
//! | Stage       | Effect                                              |
//! |-------------|-----------------------------------------------------|
//! | `Normalize` | [`AppError`] -> [`NormalizedError`] (idempotent)    |
//! | `Log`       | one structured event with the full error (optional) |
//! | `Transmit`  | status code + JSON body become the response         |
//! | `Done`      | marks the chain complete                            |

use axum::response::{IntoResponse, Response};

use super::{normalize, AppError, NormalizedError};

/// One step of the error chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Normalize,
    Log,
    Transmit,
    Done,
}

/// Error currently travelling through the chain
struct ChainState {
    raw: Option<AppError>,
    error: Option<NormalizedError>,
    response: Option<Response>,
    completed: bool,
}

impl ChainState {
    fn new(err: AppError) -> Self {
        Self {
            raw: Some(err),
            error: None,
            response: None,
            completed: false,
        }
    }

    fn normalized(&mut self) -> &NormalizedError {
        let raw = &mut self.raw;
        self.error
            .get_or_insert_with(|| raw.take().map(normalize).unwrap_or_else(NormalizedError::unexpected))
    }
}

impl ErrorStage {
    fn apply(self, state: &mut ChainState) {
        match self {
            ErrorStage::Normalize => {
                state.normalized();
            },
            ErrorStage::Log => log_error(state.normalized()),
            ErrorStage::Transmit => {
                let response = state.normalized().clone().into_response();
                state.response = Some(response);
            },
            ErrorStage::Done => {
                state.completed = true;
            },
        }
    }
}

/// Ordered error stages, built once from configuration
#[derive(Debug, Clone)]
pub struct ErrorChain {
    stages: Vec<ErrorStage>,
}

impl ErrorChain {
    /// Build the chain; `log_errors` toggles the logging stage.
    pub fn new(log_errors: bool) -> Self {
        let mut stages = vec![ErrorStage::Normalize];
        if log_errors {
            stages.push(ErrorStage::Log);
        }
        stages.push(ErrorStage::Transmit);
        stages.push(ErrorStage::Done);
        Self { stages }
    }

    pub fn stages(&self) -> &[ErrorStage] {
        &self.stages
    }

    /// Run every stage and return the response produced by `Transmit`.
    pub fn respond(&self, err: AppError) -> Response {
        let mut state = ChainState::new(err);
        for stage in &self.stages {
            stage.apply(&mut state);
        }

        if !state.completed {
            tracing::warn!("Error chain finished without reaching its final stage");
        }

        match state.response.take() {
            Some(response) => response,
            None => state.normalized().clone().into_response(),
        }
    }
}

/// Best effort: a serialization failure falls back to the debug form.
fn log_error(err: &NormalizedError) {
    let rendered = serde_json::to_string(err).unwrap_or_else(|_| format!("{err:?}"));
    if err.status_code().is_server_error() {
        tracing::error!(status = err.status, error = %rendered, "Request failed");
    } else {
        tracing::warn!(status = err.status, error = %rendered, "Request rejected");
    }
}
