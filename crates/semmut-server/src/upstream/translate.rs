//! Upstream result translation
//!
//! The service wraps every result one level deeper than the public contract:
//!
//! ```text
//! {"runMutalyzerResult": {"messages": {"SoapMessage": [...]}, "errors": "1"}}
//! ```
//!
//! becomes
//!
//! ```text
//! {"messages": [...], "errors": "1"}
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::{Params, UpstreamClient, UpstreamError};
use crate::error::{AppResult, DomainError};

/// One entry of a result's `messages` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamMessage {
    pub errorcode: String,
    /// Empty elements decode to null; those read as empty text.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl UpstreamMessage {
    /// Error-level codes start with `E`; `W` and `I` codes are informational.
    pub fn is_fatal(&self) -> bool {
        self.errorcode.starts_with('E')
    }
}

/// Flattened result of one upstream operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamResult(Map<String, Value>);

impl UpstreamResult {
    /// Unwrap the single envelope key of a raw response and flatten it.
    pub fn from_envelope(operation: &str, response: Value) -> Result<Self, UpstreamError> {
        let missing = || UpstreamError::MissingEnvelope {
            operation: operation.to_string(),
        };

        let mut envelope = match response {
            Value::Object(map) => map,
            _ => return Err(missing()),
        };

        let inner = if envelope.len() == 1 {
            envelope.into_iter().next().map(|(_, v)| v)
        } else {
            envelope.remove(&format!("{operation}Result"))
        };

        match inner.ok_or_else(missing)? {
            Value::Object(fields) => Ok(Self(flatten(fields))),
            Value::Null => Ok(Self::default()),
            other => Err(UpstreamError::Decode(format!(
                "'{operation}' result is not a structure: {other}"
            ))),
        }
    }

    /// Value of the `errors` counter; accepts numbers and numeric strings.
    pub fn error_count(&self) -> u64 {
        match self.0.get("errors") {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    /// The `messages` list. A lone message object counts as a list of one.
    pub fn messages(&self) -> Vec<UpstreamMessage> {
        let entries = match self.0.get("messages") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(item @ Value::Object(_)) => vec![item],
            _ => Vec::new(),
        };

        entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect()
    }

    /// First error-level message, if the result reports any errors at all
    pub fn first_fatal(&self) -> Option<UpstreamMessage> {
        if self.error_count() == 0 {
            return None;
        }
        self.messages().into_iter().find(UpstreamMessage::is_fatal)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for UpstreamResult {
    fn from(fields: Map<String, Value>) -> Self {
        Self(flatten(fields))
    }
}

/// Replace every single-entry object field by the value of that entry.
///
/// Scalars, arrays and objects with several entries are left untouched.
pub fn flatten(fields: Map<String, Value>) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(key, value)| match value {
            Value::Object(mut wrapper) if wrapper.len() == 1 => {
                let inner = wrapper
                    .iter_mut()
                    .next()
                    .map(|(_, v)| v.take())
                    .unwrap_or(Value::Null);
                (key, inner)
            },
            other => (key, other),
        })
        .collect()
}

/// Invoke `operation` once and translate its result.
///
/// Fails with a [`DomainError`] on the first error-level message.
#[tracing::instrument(skip(client, params))]
pub async fn call_upstream(
    client: &dyn UpstreamClient,
    operation: &str,
    params: &Params,
) -> AppResult<UpstreamResult> {
    let response = client.invoke(operation, params).await?;
    let result = UpstreamResult::from_envelope(operation, response)?;

    if let Some(fatal) = result.first_fatal() {
        tracing::debug!(code = %fatal.errorcode, "Upstream reported a fatal message");
        return Err(DomainError::from(&fatal).into());
    }

    if result.error_count() > 0 {
        let codes: Vec<String> = result.messages().into_iter().map(|m| m.errorcode).collect();
        tracing::warn!(
            errors = result.error_count(),
            codes = ?codes,
            "Upstream reported errors without an error-level message"
        );
    }

    Ok(result)
}
