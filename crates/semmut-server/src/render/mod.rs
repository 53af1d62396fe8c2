//! Output rendering
//!
//! JSON results pass through unchanged. Turtle output merges the request
//! parameters with the result, escapes every `.` in every string and renders
//! the operation's template.

pub mod escape;
pub mod media;
pub mod turtle;

use std::collections::HashMap;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use thiserror::Error;

pub use escape::escape_dots;
pub use media::{negotiate, MimeType};
pub use turtle::TurtleTemplate;

use crate::error::AppResult;
use crate::operations::OperationId;
use crate::schema::{RouteEntry, SchemaError};
use crate::upstream::{Params, UpstreamResult};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("No Turtle template registered for '{operation}'")]
    MissingTemplate { operation: String },

    #[error("Template '{template}' needs a string '{key}'")]
    MissingContext {
        template: &'static str,
        key: &'static str,
    },
}

/// Renders operation results; built once at startup.
pub struct Renderer {
    base_iri: String,
    templates: HashMap<OperationId, Box<dyn TurtleTemplate>>,
}

impl Renderer {
    /// Renderer with the template of every operation registered
    pub fn new(base_iri: impl Into<String>) -> Self {
        let mut renderer = Self::empty(base_iri);
        for operation in OperationId::ALL {
            renderer.register(operation, operation.turtle_template());
        }
        renderer
    }

    pub fn empty(base_iri: impl Into<String>) -> Self {
        Self {
            base_iri: base_iri.into().trim_end_matches('/').to_string(),
            templates: HashMap::new(),
        }
    }

    pub fn register(&mut self, operation: OperationId, template: Box<dyn TurtleTemplate>) {
        self.templates.insert(operation, template);
    }

    pub fn base_iri(&self) -> &str {
        &self.base_iri
    }

    /// Every route producing Turtle must have a template.
    pub fn ensure_templates(&self, routes: &[RouteEntry]) -> Result<(), SchemaError> {
        for route in routes {
            if route.produces.contains(&MimeType::Turtle)
                && !self.templates.contains_key(&route.operation_id)
            {
                return Err(SchemaError::MissingTemplate {
                    operation: route.operation_id.to_string(),
                    mime: MimeType::Turtle.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn render(
        &self,
        operation: OperationId,
        params: &Params,
        result: UpstreamResult,
        mime: MimeType,
    ) -> AppResult<Response> {
        match mime {
            MimeType::Json => {
                Ok((StatusCode::OK, Json(Value::Object(result.into_fields()))).into_response())
            },
            MimeType::Turtle => {
                let template =
                    self.templates
                        .get(&operation)
                        .ok_or_else(|| RenderError::MissingTemplate {
                            operation: operation.to_string(),
                        })?;

                let mut context: Map<String, Value> = params
                    .iter()
                    .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
                    .collect();
                context.extend(result.into_fields());

                let body = template.render(&self.base_iri, &escape::escape_map(&context))?;
                Ok((
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, mime.content_type())],
                    body,
                )
                    .into_response())
            },
        }
    }
}
