//! Operation table
//!
//! Every route in the schema names one of these operations. An operation is one
//! upstream call followed by rendering; adding one means adding a variant here,
//! its function and template, and its path in the schema.

use std::fmt;
use std::str::FromStr;

use axum::response::Response;
use futures::future::BoxFuture;

use crate::error::AppResult;
use crate::render::turtle::{InfoTemplate, ResourceTemplate, TranscriptsTemplate, Typing};
use crate::render::{MimeType, Renderer, TurtleTemplate};
use crate::upstream::{call_upstream, Params, UpstreamClient};

/// Everything an operation needs for one request
#[derive(Clone, Copy)]
pub struct OperationContext<'a> {
    pub upstream: &'a dyn UpstreamClient,
    pub renderer: &'a Renderer,
    pub mime: MimeType,
    /// Declared request parameters that were present
    pub params: &'a Params,
}

pub type OperationFn = for<'a> fn(OperationContext<'a>) -> BoxFuture<'a, AppResult<Response>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationId {
    RunMutalyzer,
    CheckSyntax,
    Info,
    GetTranscriptsAndInfo,
}

impl OperationId {
    pub const ALL: [OperationId; 4] = [
        OperationId::RunMutalyzer,
        OperationId::CheckSyntax,
        OperationId::Info,
        OperationId::GetTranscriptsAndInfo,
    ];

    /// Identifier used by the schema and the upstream service
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationId::RunMutalyzer => "runMutalyzer",
            OperationId::CheckSyntax => "checkSyntax",
            OperationId::Info => "info",
            OperationId::GetTranscriptsAndInfo => "getTranscriptsAndInfo",
        }
    }

    pub fn handler(&self) -> OperationFn {
        match self {
            OperationId::RunMutalyzer => run_mutalyzer,
            OperationId::CheckSyntax => check_syntax,
            OperationId::Info => info,
            OperationId::GetTranscriptsAndInfo => get_transcripts_and_info,
        }
    }

    pub fn turtle_template(&self) -> Box<dyn TurtleTemplate> {
        match self {
            OperationId::RunMutalyzer => Box::new(ResourceTemplate {
                name: "runMutalyzer",
                class: "mut:NameCheck",
                prefix: "variant",
                key: "variant",
                typing: Typing {
                    integers: &["errors", "warnings"],
                    booleans: &[],
                },
            }),
            OperationId::CheckSyntax => Box::new(ResourceTemplate {
                name: "checkSyntax",
                class: "mut:SyntaxCheck",
                prefix: "variant",
                key: "variant",
                typing: Typing {
                    integers: &[],
                    booleans: &["valid"],
                },
            }),
            OperationId::Info => Box::new(InfoTemplate),
            OperationId::GetTranscriptsAndInfo => Box::new(TranscriptsTemplate),
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationId::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("Unknown operation: {s}"))
    }
}

/// Call `operation` upstream with the named parameters and render the result.
#[tracing::instrument(skip_all, fields(operation = %operation, mime = %ctx.mime))]
async fn execute(
    ctx: OperationContext<'_>,
    operation: OperationId,
    upstream_params: &[&str],
) -> AppResult<Response> {
    let params = ctx.params.select(upstream_params);
    let result = call_upstream(ctx.upstream, operation.as_str(), &params).await?;
    ctx.renderer.render(operation, ctx.params, result, ctx.mime)
}

fn run_mutalyzer(ctx: OperationContext<'_>) -> BoxFuture<'_, AppResult<Response>> {
    Box::pin(execute(ctx, OperationId::RunMutalyzer, &["variant"]))
}

fn check_syntax(ctx: OperationContext<'_>) -> BoxFuture<'_, AppResult<Response>> {
    Box::pin(execute(ctx, OperationId::CheckSyntax, &["variant"]))
}

fn info(ctx: OperationContext<'_>) -> BoxFuture<'_, AppResult<Response>> {
    Box::pin(execute(ctx, OperationId::Info, &[]))
}

fn get_transcripts_and_info(ctx: OperationContext<'_>) -> BoxFuture<'_, AppResult<Response>> {
    Box::pin(execute(
        ctx,
        OperationId::GetTranscriptsAndInfo,
        &["genomicReference", "geneName"],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::upstream::UpstreamError;
    use async_trait::async_trait;
    use axum::{body::to_bytes, http::StatusCode};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<(String, Params)>>,
    }

    #[async_trait]
    impl UpstreamClient for RecordingClient {
        async fn invoke(&self, operation: &str, params: &Params) -> Result<Value, UpstreamError> {
            self.calls
                .lock()
                .unwrap()
                .push((operation.to_string(), params.clone()));
            match operation {
                "getTranscriptsAndInfo" => Ok(json!({
                    "getTranscriptsAndInfoResult": {
                        "TranscriptInfo": [{"id": "NM_003002.2"}, {"id": "NM_001276506.1"}]
                    }
                })),
                "info" => Err(UpstreamError::Status {
                    status: 503,
                    body: "maintenance".to_string(),
                }),
                _ => Ok(json!({ (format!("{operation}Result")): {"errors": "0"} })),
            }
        }
    }

    #[test]
    fn test_operation_ids_round_trip_through_names() {
        for op in OperationId::ALL {
            assert_eq!(op.as_str().parse::<OperationId>(), Ok(op));
            assert_eq!(op.turtle_template().name(), op.as_str());
        }
        assert!("runmutalyzer".parse::<OperationId>().is_err());
    }

    #[tokio::test]
    async fn test_operation_forwards_declared_parameters_only() {
        let client = RecordingClient::default();
        let renderer = Renderer::new("http://localhost:8888");
        let params: Params = [
            ("genomicReference", "NG_012337.1"),
            ("geneName", "SDHD"),
            ("unrelated", "x"),
        ]
        .into_iter()
        .collect();
        let ctx = OperationContext {
            upstream: &client,
            renderer: &renderer,
            mime: MimeType::Json,
            params: &params,
        };

        let response = (OperationId::GetTranscriptsAndInfo.handler())(ctx).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body["TranscriptInfo"],
            json!([{"id": "NM_003002.2"}, {"id": "NM_001276506.1"}])
        );

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "getTranscriptsAndInfo");
        let forwarded: Vec<_> = calls[0].1.iter().collect();
        assert_eq!(
            forwarded,
            vec![("genomicReference", "NG_012337.1"), ("geneName", "SDHD")]
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates() {
        let client = RecordingClient::default();
        let renderer = Renderer::new("http://localhost:8888");
        let params = Params::new();
        let ctx = OperationContext {
            upstream: &client,
            renderer: &renderer,
            mime: MimeType::Turtle,
            params: &params,
        };

        let err = match (OperationId::Info.handler())(ctx).await {
            Err(err) => err,
            Ok(_) => panic!("expected the upstream failure"),
        };
        assert!(matches!(err, AppError::Upstream(UpstreamError::Status { status: 503, .. })));
    }
}
