//! SOAP 1.1 client for the Mutalyzer web service
//!
//! Requests are plain document/literal envelopes. Responses are decoded into
//! JSON the way a WSDL-driven client shapes them:
//!
//! - child elements become object keys (namespace prefixes dropped)
//! - repeated siblings become arrays
//! - text-only elements become strings, empty or blank elements become `null`

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::{escape::escape, events::Event, Reader};
use reqwest::header::CONTENT_TYPE;
use serde_json::{Map, Value};
use url::Url;

use super::{Params, UpstreamClient, UpstreamError};
use crate::config::UpstreamConfig;

const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Longest upstream body quoted in an error
const MAX_ERROR_BODY: usize = 512;

/// Production [`UpstreamClient`]
#[derive(Debug, Clone)]
pub struct SoapClient {
    http: reqwest::Client,
    endpoint: Url,
    namespace: String,
}

impl SoapClient {
    /// Build the client once at startup; it is shared by all requests.
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let endpoint = config
            .endpoint()
            .map_err(|e| UpstreamError::Config(e.to_string()))?;

        let mut builder =
            reqwest::Client::builder().user_agent(concat!("semmut/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            endpoint,
            namespace: config.namespace.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Request envelope for `operation`, parameters in declaration order
    pub fn envelope(&self, operation: &str, params: &Params) -> String {
        let mut arguments = String::new();
        for (name, value) in params.iter() {
            let _ = write!(arguments, "<tns:{name}>{}</tns:{name}>", escape(value));
        }

        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<soap:Envelope xmlns:soap="{envelope_ns}" xmlns:tns="{ns}">"#,
                "<soap:Body><tns:{op}>{args}</tns:{op}></soap:Body>",
                "</soap:Envelope>"
            ),
            envelope_ns = SOAP_ENVELOPE_NS,
            ns = escape(self.namespace.as_str()),
            op = operation,
            args = arguments,
        )
    }
}

#[async_trait]
impl UpstreamClient for SoapClient {
    #[tracing::instrument(skip(self, params), fields(endpoint = %self.endpoint))]
    async fn invoke(&self, operation: &str, params: &Params) -> Result<Value, UpstreamError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{operation}\""))
            .body(self.envelope(operation, params))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        tracing::debug!(status = status.as_u16(), bytes = text.len(), "Upstream responded");

        // faults arrive with HTTP 500 and carry the better message
        match decode_response(operation, &text) {
            Err(fault @ UpstreamError::Fault { .. }) => Err(fault),
            _ if !status.is_success() => Err(UpstreamError::Status {
                status: status.as_u16(),
                body: truncate(&text),
            }),
            decoded => decoded,
        }
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Extract the `<operation>Response` element of a SOAP response document.
pub fn decode_response(operation: &str, xml: &str) -> Result<Value, UpstreamError> {
    let document = decode_document(xml)?;
    let body = document
        .get("Envelope")
        .and_then(|envelope| envelope.get("Body"))
        .and_then(Value::as_object)
        .ok_or_else(|| UpstreamError::Decode("missing SOAP envelope body".to_string()))?;

    if let Some(fault) = body.get("Fault") {
        return Err(UpstreamError::Fault {
            code: text_field(fault, "faultcode").unwrap_or_else(|| "Server".to_string()),
            message: text_field(fault, "faultstring")
                .unwrap_or_else(|| "Unknown SOAP fault".to_string()),
        });
    }

    let response_name = format!("{operation}Response");
    let response = match body.get(&response_name) {
        Some(response) => Some(response),
        None if body.len() == 1 => body.values().next(),
        None => None,
    };

    response.cloned().ok_or(UpstreamError::MissingEnvelope {
        operation: operation.to_string(),
    })
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Map::new(),
            text: String::new(),
        }
    }

    fn into_entry(self) -> (String, Value) {
        let value = if !self.children.is_empty() {
            Value::Object(self.children)
        } else if self.text.trim().is_empty() {
            // formatting whitespace around absent content
            Value::Null
        } else {
            Value::String(self.text)
        };
        (self.name, value)
    }

    fn attach(&mut self, name: String, value: Value) {
        match self.children.get_mut(&name) {
            // arrays only ever come from repeated siblings
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            },
            None => {
                self.children.insert(name, value);
            },
        }
    }
}

/// Decode a whole XML document into nested JSON objects.
pub fn decode_document(xml: &str) -> Result<Value, UpstreamError> {
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Frame::new(String::new())];

    loop {
        let event = reader.read_event().map_err(|e| {
            UpstreamError::Decode(format!("at byte {}: {e}", reader.buffer_position()))
        })?;

        match event {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                stack.push(Frame::new(name));
            },
            Event::Empty(empty) => {
                let name = String::from_utf8_lossy(empty.local_name().as_ref()).into_owned();
                current(&mut stack)?.attach(name, Value::Null);
            },
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| UpstreamError::Decode(e.to_string()))?;
                current(&mut stack)?.text.push_str(&text);
            },
            Event::CData(cdata) => {
                let text = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                current(&mut stack)?.text.push_str(&text);
            },
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(UpstreamError::Decode("unbalanced end tag".to_string()));
                }
                if let Some(frame) = stack.pop() {
                    let (name, value) = frame.into_entry();
                    current(&mut stack)?.attach(name, value);
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    match stack.pop() {
        Some(root) if stack.is_empty() => Ok(Value::Object(root.children)),
        _ => Err(UpstreamError::Decode("document ended inside an element".to_string())),
    }
}

fn current(stack: &mut [Frame]) -> Result<&mut Frame, UpstreamError> {
    stack
        .last_mut()
        .ok_or_else(|| UpstreamError::Decode("content outside of the document".to_string()))
}
