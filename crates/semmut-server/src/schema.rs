//! API schema
//!
//! The Swagger 2.0 document served at `/swagger.json` is also the routing
//! table: every path/method pair becomes a [`RouteEntry`] at startup.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::operations::OperationId;
use crate::render::MimeType;

/// Methods a path item may declare
pub const HTTP_METHODS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema has no 'paths' object")]
    MissingPaths,

    #[error("Invalid schema entry for {context}: {source}")]
    Invalid {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported method '{method}' on path '{path}'")]
    UnsupportedMethod { path: String, method: String },

    #[error("{method} {path} declares no operation")]
    MissingOperation { path: String, method: String },

    #[error("{method} {path} refers to unknown operation '{operation}'")]
    UnknownOperation {
        path: String,
        method: String,
        operation: String,
    },

    #[error("{path} produces unsupported type '{mime}'")]
    UnsupportedMimeType { path: String, mime: String },

    #[error("Operation '{operation}' produces {mime} but has no template for it")]
    MissingTemplate { operation: String, mime: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Path,
    Header,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Query => "query",
            ParameterLocation::Path => "path",
            ParameterLocation::Header => "header",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
}

/// One routable path/method pair
#[derive(Debug, Clone, PartialEq)]
pub struct RouteEntry {
    /// Schema path template, e.g. `/references/{genomicReference}/transcripts`
    pub path: String,
    /// Lowercase HTTP method
    pub method: String,
    pub operation_id: OperationId,
    pub parameters: Vec<ParameterSpec>,
    pub produces: Vec<MimeType>,
}

impl RouteEntry {
    /// The path in router syntax: `{name}` becomes `:name`.
    pub fn router_path(&self) -> String {
        to_router_path(&self.path)
    }
}

pub fn to_router_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        match rest[open..].find('}') {
            Some(len) => {
                out.push_str(&rest[..open]);
                out.push(':');
                out.push_str(&rest[open + 1..open + len]);
                rest = &rest[open + len + 1..];
            },
            None => break,
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Deserialize)]
struct RawOperation {
    #[serde(rename = "x-operation")]
    x_operation: Option<String>,
    #[serde(rename = "operationId")]
    operation_id: Option<String>,
    #[serde(default)]
    parameters: Vec<ParameterSpec>,
    produces: Option<Vec<String>>,
}

fn parse<T: serde::de::DeserializeOwned>(value: &Value, context: &str) -> Result<T, SchemaError> {
    serde_json::from_value(value.clone()).map_err(|source| SchemaError::Invalid {
        context: context.to_string(),
        source,
    })
}

fn parse_produces(path: &str, produces: &[String]) -> Result<Vec<MimeType>, SchemaError> {
    produces
        .iter()
        .map(|mime| {
            mime.parse().map_err(|_| SchemaError::UnsupportedMimeType {
                path: path.to_string(),
                mime: mime.clone(),
            })
        })
        .collect()
}

/// Operation parameters override path-level ones of the same name and location.
fn merge_parameters(shared: &[ParameterSpec], own: Vec<ParameterSpec>) -> Vec<ParameterSpec> {
    let mut merged: Vec<ParameterSpec> = shared
        .iter()
        .filter(|p| !own.iter().any(|o| o.name == p.name && o.location == p.location))
        .cloned()
        .collect();
    merged.extend(own);
    merged
}

/// Read every route from a schema document.
///
/// Keys starting with `x-` are extensions and never routes. Every operation
/// identifier must name a known operation.
pub fn route_entries(schema: &Value) -> Result<Vec<RouteEntry>, SchemaError> {
    let paths = schema
        .get("paths")
        .and_then(Value::as_object)
        .ok_or(SchemaError::MissingPaths)?;

    let default_produces: Vec<String> = match schema.get("produces") {
        Some(produces) => parse(produces, "produces")?,
        None => vec![MimeType::Json.as_str().to_string()],
    };

    let mut routes = Vec::new();
    for (path, item) in paths {
        if path.starts_with("x-") {
            continue;
        }
        let item = item.as_object().cloned().unwrap_or_else(Map::new);

        let shared: Vec<ParameterSpec> = match item.get("parameters") {
            Some(parameters) => parse(parameters, &format!("{path} parameters"))?,
            None => Vec::new(),
        };

        for (method, operation) in &item {
            if method.starts_with("x-") || method == "parameters" {
                continue;
            }
            if !HTTP_METHODS.contains(&method.as_str()) {
                return Err(SchemaError::UnsupportedMethod {
                    path: path.clone(),
                    method: method.clone(),
                });
            }

            let raw: RawOperation = parse(operation, &format!("{method} {path}"))?;
            let name = raw
                .x_operation
                .or(raw.operation_id)
                .ok_or_else(|| SchemaError::MissingOperation {
                    path: path.clone(),
                    method: method.clone(),
                })?;
            let operation_id: OperationId =
                name.parse().map_err(|_| SchemaError::UnknownOperation {
                    path: path.clone(),
                    method: method.clone(),
                    operation: name.clone(),
                })?;

            let produces = raw.produces.as_deref().unwrap_or(&default_produces);

            routes.push(RouteEntry {
                path: path.clone(),
                method: method.clone(),
                operation_id,
                parameters: merge_parameters(&shared, raw.parameters),
                produces: parse_produces(path, produces)?,
            });
        }
    }

    Ok(routes)
}

fn messages_schema() -> Value {
    json!({
        "type": "array",
        "items": {"$ref": "#/definitions/SoapMessage"}
    })
}

fn string_list() -> Value {
    json!({"type": "array", "items": {"type": "string"}})
}

fn variant_parameter() -> Value {
    json!({
        "name": "variant",
        "in": "query",
        "description": "Variant description in HGVS format, e.g. 'AB026906.1:c.274G>T'",
        "required": true,
        "type": "string"
    })
}

fn responses(ok_description: &str, definition: &str) -> Value {
    json!({
        "200": {
            "description": ok_description,
            "schema": {"$ref": format!("#/definitions/{definition}")}
        },
        "400": {
            "description": "Invalid request or a fatal message from Mutalyzer",
            "schema": {"$ref": "#/definitions/Error"}
        },
        "406": {
            "description": "None of the accepted types can be produced",
            "schema": {"$ref": "#/definitions/Error"}
        },
        "500": {
            "description": "Unexpected server error",
            "schema": {"$ref": "#/definitions/Error"}
        }
    })
}

/// The schema document for a server reachable at `host:port`
pub fn document(host: &str, port: u16) -> Value {
    json!({
        "swagger": "2.0",
        "info": {
            "title": "Semantic Mutalyzer",
            "description": "REST, JSON and Turtle access to the Mutalyzer variant nomenclature services",
            "version": env!("CARGO_PKG_VERSION"),
            "license": {"name": "MIT"}
        },
        "host": format!("{host}:{port}"),
        "basePath": "/",
        "schemes": ["http"],
        "consumes": ["application/json"],
        "produces": ["application/json", "text/turtle"],
        "paths": {
            "/runMutalyzer": {
                "get": {
                    "x-operation": "runMutalyzer",
                    "summary": "Run the name checker on a variant description",
                    "parameters": [variant_parameter()],
                    "responses": responses("Name checker results", "RunMutalyzerOutput")
                }
            },
            "/checkSyntax": {
                "get": {
                    "x-operation": "checkSyntax",
                    "summary": "Check the syntax of a variant description",
                    "parameters": [variant_parameter()],
                    "responses": responses("Syntax check results", "CheckSyntaxOutput")
                }
            },
            "/info": {
                "get": {
                    "x-operation": "info",
                    "summary": "Version information of the Mutalyzer service",
                    "responses": responses("Service information", "InfoOutput")
                }
            },
            "/references/{genomicReference}/transcripts": {
                "parameters": [{
                    "name": "genomicReference",
                    "in": "path",
                    "description": "Genomic reference sequence, e.g. 'NG_012337.1'",
                    "required": true,
                    "type": "string"
                }],
                "get": {
                    "x-operation": "getTranscriptsAndInfo",
                    "summary": "Transcripts annotated on a genomic reference",
                    "parameters": [{
                        "name": "geneName",
                        "in": "query",
                        "description": "Restrict the transcripts to this gene",
                        "required": false,
                        "type": "string"
                    }],
                    "responses": responses("Transcripts of the reference", "TranscriptsOutput")
                }
            }
        },
        "definitions": {
            "SoapMessage": {
                "type": "object",
                "required": ["errorcode", "message"],
                "properties": {
                    "errorcode": {"type": "string"},
                    "message": {"type": "string"}
                }
            },
            "RunMutalyzerOutput": {
                "type": "object",
                "properties": {
                    "referenceId": {"type": "string"},
                    "sourceId": {"type": "string"},
                    "sourceAccession": {"type": "string"},
                    "sourceVersion": {"type": "string"},
                    "sourceGi": {"type": "string"},
                    "molecule": {"type": "string"},
                    "errors": {"type": "string"},
                    "warnings": {"type": "string"},
                    "summary": {"type": "string"},
                    "chromDescription": {"type": "string"},
                    "genomicDescription": {"type": "string"},
                    "genomicDnaDescription": {"type": "string"},
                    "transcriptDescriptions": string_list(),
                    "proteinDescriptions": string_list(),
                    "messages": messages_schema()
                }
            },
            "CheckSyntaxOutput": {
                "type": "object",
                "properties": {
                    "valid": {"type": "string"},
                    "messages": messages_schema()
                }
            },
            "InfoOutput": {
                "type": "object",
                "properties": {
                    "version": {"type": "string"},
                    "versionParts": string_list(),
                    "releaseDate": {"type": "string"},
                    "nomenclatureVersion": {"type": "string"},
                    "nomenclatureVersionParts": string_list(),
                    "serverName": {"type": "string"},
                    "contactEmail": {"type": "string"},
                    "announcement": {"type": "string"},
                    "announcementUrl": {"type": "string"}
                }
            },
            "TranscriptInfo": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "id": {"type": "string"},
                    "product": {"type": "string"},
                    "locusTag": {"type": "string"},
                    "linkMethod": {"type": "string"},
                    "cTransStart": {"type": "string"},
                    "gTransStart": {"type": "string"},
                    "chromTransStart": {"type": "string"},
                    "cTransEnd": {"type": "string"},
                    "gTransEnd": {"type": "string"},
                    "chromTransEnd": {"type": "string"},
                    "cCDSStart": {"type": "string"},
                    "gCDSStart": {"type": "string"},
                    "cCDSStop": {"type": "string"},
                    "gCDSStop": {"type": "string"},
                    "proteinTranscript": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "id": {"type": "string"},
                            "product": {"type": "string"}
                        }
                    }
                }
            },
            "TranscriptsOutput": {
                "type": "object",
                "properties": {
                    "TranscriptInfo": {
                        "type": "array",
                        "items": {"$ref": "#/definitions/TranscriptInfo"}
                    }
                }
            },
            "Error": {
                "type": "object",
                "required": ["status", "message"],
                "properties": {
                    "status": {"type": "integer"},
                    "message": {"type": "string"},
                    "code": {"type": "string"},
                    "info": {
                        "type": "object",
                        "additionalProperties": {"type": "string"}
                    }
                }
            }
        }
    })
}
