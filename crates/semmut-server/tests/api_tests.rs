//! API integration tests for the Semantic Mutalyzer server
//!
//! These tests drive the assembled router with a stub upstream client.
//!
//! Coverage includes:
//! - JSON and Turtle output of every operation
//! - Domain, validation and unexpected errors through the error chain
//! - Content negotiation, path parameters, unknown routes
//! - The schema document and health endpoint

use axum::http::{Method, StatusCode};
use semmut_server::error::GENERIC_ERROR_MESSAGE;
use semmut_server::upstream::UpstreamError;
use serde_json::json;

mod helpers;

use helpers::{create_test_app, get, send, StubClient};

const VARIANT_QUERY: &str = "/runMutalyzer?variant=AB026906.1%3Ac.274G%3ET";

fn name_checker_response() -> serde_json::Value {
    json!({
        "runMutalyzerResult": {
            "referenceId": "AB026906.1",
            "molecule": "g",
            "errors": "0",
            "warnings": "1",
            "genomicDescription": "AB026906.1:g.274G>T",
            "transcriptDescriptions": {"string": ["AB026906.1(SDHD_v001):c.274G>T"]},
            "messages": {"SoapMessage": [
                {"errorcode": "WNOTRANS", "message": "No transcripts found."}
            ]}
        }
    })
}

// ============================================================================
// Successful Operations
// ============================================================================

#[tokio::test]
async fn test_run_mutalyzer_json() {
    let client = StubClient::returning(name_checker_response());
    let app = create_test_app(client.clone());

    let response = get(&app, VARIANT_QUERY, Some("application/json")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type.as_deref(), Some("application/json"));
    assert_eq!(
        response.json(),
        json!({
            "referenceId": "AB026906.1",
            "molecule": "g",
            "errors": "0",
            "warnings": "1",
            "genomicDescription": "AB026906.1:g.274G>T",
            "transcriptDescriptions": ["AB026906.1(SDHD_v001):c.274G>T"],
            "messages": [{"errorcode": "WNOTRANS", "message": "No transcripts found."}]
        })
    );

    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "runMutalyzer");
    assert_eq!(calls[0].1.get("variant"), Some("AB026906.1:c.274G>T"));
}

#[tokio::test]
async fn test_run_mutalyzer_turtle() {
    let app = create_test_app(StubClient::returning(name_checker_response()));

    let response = get(&app, VARIANT_QUERY, Some("text/turtle")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response
        .content_type
        .as_deref()
        .unwrap()
        .starts_with("text/turtle"));
    assert!(response.body.contains("AB026906\\.1:c\\.274G>T"));
    assert!(response.body.contains("@prefix mut: <http://localhost:8888/vocab#> ."));
    assert!(response.body.contains("a mut:NameCheck"));
    assert!(response.body.contains("mut:warnings 1"));
    assert!(response
        .body
        .contains("mut:transcriptDescriptions \"AB026906.1(SDHD_v001):c.274G>T\""));
    response.assert_valid_turtle();
}

#[tokio::test]
async fn test_run_mutalyzer_turtle_with_unusual_variants() {
    let app = create_test_app(StubClient::returning(name_checker_response()));

    for query in [
        "/runMutalyzer?variant=NM_003002.2%3Ac.274%2B1G%3ET",
        "/runMutalyzer?variant=NM_003002.2%3Ac.%5B274G%3ET%3B300del%5D",
        "/runMutalyzer?variant=x%C2%B2%C2%AA",
    ] {
        let response = get(&app, query, Some("text/turtle")).await;
        assert_eq!(response.status, StatusCode::OK);
        response.assert_valid_turtle();
    }
}

#[tokio::test]
async fn test_missing_accept_defaults_to_json() {
    let app = create_test_app(StubClient::returning(name_checker_response()));

    let response = get(&app, VARIANT_QUERY, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["referenceId"], "AB026906.1");
}

#[tokio::test]
async fn test_transcripts_use_path_and_query_parameters() {
    let client = StubClient::new(|operation, _| {
        assert_eq!(operation, "getTranscriptsAndInfo");
        Ok(json!({
            "getTranscriptsAndInfoResult": {
                "TranscriptInfo": [
                    {"id": "NM_003002.2", "name": "SDHD_v001", "product": "succinate dehydrogenase"}
                ]
            }
        }))
    });
    let app = create_test_app(client.clone());

    let response = get(
        &app,
        "/references/NG_012337.1/transcripts?geneName=SDHD",
        Some("application/json"),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["TranscriptInfo"][0]["id"], "NM_003002.2");

    let calls = client.calls();
    let forwarded: Vec<_> = calls[0].1.iter().collect();
    assert_eq!(
        forwarded,
        vec![("genomicReference", "NG_012337.1"), ("geneName", "SDHD")]
    );

    let turtle = get(&app, "/references/NG_012337.1/transcripts", Some("text/turtle")).await;
    assert_eq!(turtle.status, StatusCode::OK);
    assert!(turtle.body.contains("reference:NG_012337\\.1"));
    assert!(turtle.body.contains("transcript:NM_003002\\.2"));
    turtle.assert_valid_turtle();
}

#[tokio::test]
async fn test_info_and_check_syntax() {
    let client = StubClient::new(|operation, _| match operation {
        "info" => Ok(json!({"infoResult": {"version": "2.0.35", "serverName": "mutalyzer"}})),
        "checkSyntax" => Ok(json!({"checkSyntaxResult": {"valid": "true", "messages": null}})),
        other => panic!("unexpected operation {other}"),
    });
    let app = create_test_app(client);

    let info = get(&app, "/info", Some("application/json")).await;
    assert_eq!(info.status, StatusCode::OK);
    assert_eq!(info.json(), json!({"version": "2.0.35", "serverName": "mutalyzer"}));

    let syntax = get(&app, "/checkSyntax?variant=NM_003002.2%3Ac.274G%3ET", Some("text/turtle")).await;
    assert_eq!(syntax.status, StatusCode::OK);
    assert!(syntax.body.contains("a mut:SyntaxCheck"));
    assert!(syntax.body.contains("mut:valid true"));
    syntax.assert_valid_turtle();

    let info_turtle = get(&app, "/info", Some("text/turtle")).await;
    assert_eq!(info_turtle.status, StatusCode::OK);
    assert!(info_turtle.body.contains("a mut:ServiceInfo"));
    info_turtle.assert_valid_turtle();
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_domain_error_from_upstream() {
    let app = create_test_app(StubClient::returning(json!({
        "runMutalyzerResult": {
            "errors": "1",
            "messages": {"SoapMessage": [
                {"errorcode": "EREF", "message": "Reference not found"}
            ]}
        }
    })));

    let response = get(&app, VARIANT_QUERY, Some("application/json")).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json(),
        json!({"status": 400, "message": "Reference not found", "code": "EREF"})
    );
}

#[tokio::test]
async fn test_missing_required_parameter() {
    let client = StubClient::returning(name_checker_response());
    let app = create_test_app(client.clone());

    let response = get(&app, "/runMutalyzer", Some("application/json")).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = response.json();
    assert_eq!(body["status"], 400);
    assert_eq!(body["message"], "Missing required query parameter 'variant'");
    assert_eq!(body["info"], json!({}));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_not_acceptable() {
    let app = create_test_app(StubClient::returning(name_checker_response()));

    let response = get(&app, VARIANT_QUERY, Some("text/html")).await;

    assert_eq!(response.status, StatusCode::NOT_ACCEPTABLE);
    let body = response.json();
    assert_eq!(body["status"], 406);
    assert_eq!(
        body["message"],
        "Accept header \"text/html\" does not match any of the producible types"
    );
    assert_eq!(body["info"]["produces"], "application/json, text/turtle");
}

#[tokio::test]
async fn test_upstream_failure_is_unexpected() {
    let app = create_test_app(StubClient::new(|_, _| {
        Err(UpstreamError::Status {
            status: 502,
            body: "<html>bad gateway</html>".to_string(),
        })
    }));

    let response = get(&app, VARIANT_QUERY, Some("application/json")).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json(),
        json!({"status": 500, "message": GENERIC_ERROR_MESSAGE})
    );
    assert!(!response.body.contains("bad gateway"));
}

#[tokio::test]
async fn test_operation_panic_goes_through_the_chain() {
    let app = create_test_app(StubClient::new(|_, _| panic!("stub exploded")));

    let response = get(&app, "/info", None).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["message"], GENERIC_ERROR_MESSAGE);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = create_test_app(StubClient::returning(json!({})));

    let response = get(&app, "/does/not/exist", None).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.json(),
        json!({"status": 404, "message": "Resource not found: /does/not/exist", "info": {}})
    );
}

#[tokio::test]
async fn test_wrong_method() {
    let app = create_test_app(StubClient::returning(json!({})));

    let response = send(&app, Method::POST, "/info", None).await;

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.json()["message"], "Method not allowed: POST /info");

    for path in ["/swagger.json", "/health"] {
        let response = send(&app, Method::POST, path, None).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert_eq!(response.json()["status"], 405);
        assert_eq!(
            response.json()["message"],
            format!("Method not allowed: POST {path}")
        );
    }
}

// ============================================================================
// Static Routes
// ============================================================================

#[tokio::test]
async fn test_swagger_document() {
    let app = create_test_app(StubClient::returning(json!({})));

    let response = get(&app, "/swagger.json", None).await;

    assert_eq!(response.status, StatusCode::OK);
    let schema = response.json();
    assert_eq!(schema["swagger"], "2.0");
    assert_eq!(schema["host"], "localhost:8888");
    assert_eq!(
        schema["paths"]["/runMutalyzer"]["get"]["x-operation"],
        "runMutalyzer"
    );
    assert!(schema["paths"]["/references/{genomicReference}/transcripts"].is_object());
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app(StubClient::returning(json!({})));

    let response = get(&app, "/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "healthy");
}
