//! Upstream Mutalyzer service
//!
//! - [`UpstreamClient`]: the seam between request handling and the remote
//!   service. One client is built at startup and shared by every request.
//! - [`SoapClient`]: the production client, speaking SOAP 1.1 over `reqwest`.
//! - [`call_upstream`]: one round-trip plus envelope flattening and fatal
//!   message detection.

pub mod soap;
pub mod translate;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use soap::SoapClient;
pub use translate::{call_upstream, flatten, UpstreamMessage, UpstreamResult};

/// Parameters of one upstream call, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter, keeping its first position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The subset of `names` that is present, in the order of `names`
    pub fn select(&self, names: &[&str]) -> Params {
        let mut selected = Params::new();
        for name in names {
            if let Some(value) = self.get(name) {
                selected.insert(*name, value);
            }
        }
        selected
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

/// Upstream call failures
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("SOAP fault {code}: {message}")]
    Fault { code: String, message: String },

    #[error("Malformed upstream response: {0}")]
    Decode(String),

    #[error("Response to '{operation}' has no result envelope")]
    MissingEnvelope { operation: String },

    #[error("Invalid upstream configuration: {0}")]
    Config(String),
}

/// A client able to invoke named upstream operations
///
/// `invoke` returns the decoded response element of the operation, still
/// wrapped in its result envelope (e.g. `{"runMutalyzerResult": {...}}`).
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn invoke(&self, operation: &str, params: &Params) -> Result<Value, UpstreamError>;
}
