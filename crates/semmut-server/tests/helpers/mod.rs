//! Test helpers for Semantic Mutalyzer integration tests
//!
//! This module provides utilities for:
//! - A stub upstream client with canned responses and call recording
//! - Building the application router around it
//! - Sending requests and reading bodies
//! - Checking that Turtle bodies parse

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use semmut_server::{
    api,
    config::Config,
    upstream::{Params, UpstreamClient, UpstreamError},
};
use serde_json::Value;
use tower::ServiceExt;

type Responder = dyn Fn(&str, &Params) -> Result<Value, UpstreamError> + Send + Sync;

/// Upstream client answering from a closure
pub struct StubClient {
    respond: Box<Responder>,
    calls: Mutex<Vec<(String, Params)>>,
}

impl StubClient {
    pub fn new(
        respond: impl Fn(&str, &Params) -> Result<Value, UpstreamError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Always answer with `response`
    pub fn returning(response: Value) -> Arc<Self> {
        Self::new(move |_, _| Ok(response.clone()))
    }

    pub fn calls(&self) -> Vec<(String, Params)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamClient for StubClient {
    async fn invoke(&self, operation: &str, params: &Params) -> Result<Value, UpstreamError> {
        self.calls
            .lock()
            .unwrap()
            .push((operation.to_string(), params.clone()));
        (self.respond)(operation, params)
    }
}

/// Default configuration with error logging switched off
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.logging.error_log = false;
    config
}

pub fn create_test_app(client: Arc<StubClient>) -> Router {
    api::create_router(&test_config(), client).expect("router should build from the schema")
}

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("body should be JSON")
    }

    /// Fails the test unless the body parses as Turtle
    pub fn assert_valid_turtle(&self) {
        let errors: Vec<String> = oxttl::TurtleParser::new()
            .for_slice(self.body.as_bytes())
            .filter_map(Result::err)
            .map(|e| e.to_string())
            .collect();
        assert!(errors.is_empty(), "invalid Turtle {errors:?} in:\n{}", self.body);
    }
}

pub async fn send(app: &Router, method: Method, uri: &str, accept: Option<&str>) -> TestResponse {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(accept) = accept {
        request = request.header(header::ACCEPT, accept);
    }

    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    TestResponse {
        status,
        content_type,
        body: String::from_utf8(body.to_vec()).unwrap(),
    }
}

pub async fn get(app: &Router, uri: &str, accept: Option<&str>) -> TestResponse {
    send(app, Method::GET, uri, accept).await
}
