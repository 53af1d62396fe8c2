//! Per-route request handling
//!
//! For one schema route: collect the declared parameters, negotiate the
//! response format, run the operation and send every failure through the
//! error chain.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    extract::{rejection::RawPathParamsRejection, RawPathParams, State},
    http::{header::ACCEPT, HeaderMap, Uri},
    response::Response,
};
use futures::FutureExt;

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::panic_message;
use crate::operations::OperationContext;
use crate::render::negotiate;
use crate::schema::{ParameterLocation, RouteEntry};
use crate::upstream::Params;

/// Handler registered for one route entry
pub async fn handle(
    route: Arc<RouteEntry>,
    state: AppState,
    path_params: Vec<(String, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    match run(&route, &state, &path_params, &uri, &headers).await {
        Ok(response) => response,
        Err(err) => state.errors.respond(err),
    }
}

/// Decoded path parameters; a route without parameters has none.
pub fn path_params(raw: Result<RawPathParams, RawPathParamsRejection>) -> Vec<(String, String)> {
    match raw {
        Ok(params) => params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tracing::instrument(
    skip_all,
    fields(operation = %route.operation_id, method = %route.method, path = %route.path)
)]
async fn run(
    route: &RouteEntry,
    state: &AppState,
    path_params: &[(String, String)],
    uri: &Uri,
    headers: &HeaderMap,
) -> AppResult<Response> {
    let params = extract_params(route, path_params, uri, headers)?;

    let accept = headers.get(ACCEPT).and_then(|value| value.to_str().ok());
    let mime = negotiate(accept, &route.produces).ok_or_else(|| {
        let produces: Vec<&str> = route.produces.iter().map(|m| m.as_str()).collect();
        AppError::not_acceptable(accept.unwrap_or_default(), &produces)
    })?;

    let ctx = OperationContext {
        upstream: state.upstream.as_ref(),
        renderer: state.renderer.as_ref(),
        mime,
        params: &params,
    };
    let operation = route.operation_id.handler();

    // covers panics while building the future as well as while polling it
    AssertUnwindSafe(async move { operation(ctx).await })
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(AppError::Panic(panic_message(panic.as_ref()))))
}

/// Collect every declared parameter that is present, in declaration order.
fn extract_params(
    route: &RouteEntry,
    path_params: &[(String, String)],
    uri: &Uri,
    headers: &HeaderMap,
) -> AppResult<Params> {
    let query: Vec<(String, String)> = uri
        .query()
        .map(|query| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let mut params = Params::new();
    for spec in &route.parameters {
        let value = match spec.location {
            ParameterLocation::Path => lookup(path_params, &spec.name),
            ParameterLocation::Query => lookup(&query, &spec.name),
            ParameterLocation::Header => headers
                .get(spec.name.as_str())
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
        };

        match value {
            Some(value) if !(spec.required && value.is_empty()) => params.insert(&spec.name, value),
            _ if spec.required => {
                return Err(AppError::missing_parameter(spec.location.as_str(), &spec.name));
            },
            _ => {},
        }
    }

    Ok(params)
}

/// First value wins for repeated names.
fn lookup(pairs: &[(String, String)], name: &str) -> Option<String> {
    pairs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, value)| value.clone())
}

/// Fallback for paths no route matches
pub async fn not_found(State(state): State<AppState>, uri: Uri) -> Response {
    state.errors.respond(AppError::not_found(uri.path()))
}
