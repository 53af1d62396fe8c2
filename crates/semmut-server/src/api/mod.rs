//! HTTP surface
//!
//! Operation routes come from the schema document; `/swagger.json`, `/health`
//! and `/docs` are served next to them.

pub mod dispatch;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::RawPathParamsRejection, OriginalUri, RawPathParams, State},
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    routing::{get, MethodFilter, MethodRouter},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{compression::CompressionLayer, services::ServeDir};

use crate::config::Config;
use crate::error::{AppError, ErrorChain};
use crate::middleware;
use crate::render::Renderer;
use crate::schema::{self, RouteEntry, SchemaError};
use crate::upstream::UpstreamClient;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn UpstreamClient>,
    pub renderer: Arc<Renderer>,
    pub errors: Arc<ErrorChain>,
    pub schema: Arc<Value>,
}

pub async fn serve(config: Config, upstream: Arc<dyn UpstreamClient>) -> anyhow::Result<()> {
    let app = create_router(&config, upstream)?;

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    tracing::info!(
        "Semantic Mutalyzer listening on http://{}:{}",
        config.server.host,
        listener.local_addr()?.port()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Assemble the application router.
///
/// Fails when the schema names an unknown operation or an operation without
/// a template for one of its output formats.
pub fn create_router(config: &Config, upstream: Arc<dyn UpstreamClient>) -> Result<Router, SchemaError> {
    let document = schema::document(&config.server.host, config.server.port);
    let routes = schema::route_entries(&document)?;

    let renderer = Renderer::new(format!(
        "http://{}:{}",
        config.server.host, config.server.port
    ));
    renderer.ensure_templates(&routes)?;

    let state = AppState {
        upstream,
        renderer: Arc::new(renderer),
        errors: Arc::new(ErrorChain::new(config.logging.error_log)),
        schema: Arc::new(document),
    };

    let mut router = Router::new()
        .route("/swagger.json", get(swagger).fallback(method_not_allowed))
        .route("/health", get(health).fallback(method_not_allowed));

    for (path, method_router) in operation_routes(routes)? {
        tracing::debug!(path = %path, "Registering operation route");
        router = router.route(&path, method_router);
    }

    if let Some(dir) = &config.docs.dir {
        tracing::info!(dir = %dir.display(), "Serving documentation under /docs");
        router = router.nest_service("/docs", ServeDir::new(dir));
    }

    let errors = state.errors.clone();
    Ok(router
        .fallback(dispatch::not_found)
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(middleware::catch_panic_layer(errors))
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors)))
}

/// One method router per path, keyed by the path in router syntax
fn operation_routes(
    routes: Vec<RouteEntry>,
) -> Result<BTreeMap<String, MethodRouter<AppState>>, SchemaError> {
    let mut by_path: BTreeMap<String, MethodRouter<AppState>> = BTreeMap::new();

    for route in routes {
        let filter = method_filter(&route)?;
        let path = route.router_path();
        let route = Arc::new(route);

        let handler = move |State(state): State<AppState>,
                            raw: Result<RawPathParams, RawPathParamsRejection>,
                            uri: Uri,
                            headers: HeaderMap| {
            let route = route.clone();
            let path_params = dispatch::path_params(raw);
            dispatch::handle(route, state, path_params, uri, headers)
        };

        let method_router = by_path
            .remove(&path)
            .unwrap_or_else(|| MethodRouter::new().fallback(method_not_allowed));
        by_path.insert(path, method_router.on(filter, handler));
    }

    Ok(by_path)
}

fn method_filter(route: &RouteEntry) -> Result<MethodFilter, SchemaError> {
    match route.method.as_str() {
        "get" => Ok(MethodFilter::GET),
        "put" => Ok(MethodFilter::PUT),
        "post" => Ok(MethodFilter::POST),
        "delete" => Ok(MethodFilter::DELETE),
        "options" => Ok(MethodFilter::OPTIONS),
        "head" => Ok(MethodFilter::HEAD),
        "patch" => Ok(MethodFilter::PATCH),
        other => Err(SchemaError::UnsupportedMethod {
            path: route.path.clone(),
            method: other.to_string(),
        }),
    }
}

async fn method_not_allowed(
    State(state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
) -> Response {
    state
        .errors
        .respond(AppError::method_not_allowed(method.as_str(), uri.path()))
}

async fn swagger(State(state): State<AppState>) -> Json<Value> {
    Json(state.schema.as_ref().clone())
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "name": "Semantic Mutalyzer",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "healthy"
    }))
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }

    tracing::info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(std::time::Duration::from_secs(timeout_secs.min(5))).await;
}
