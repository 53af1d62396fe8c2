//! Configuration management
//!
//! Layers, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. a JSON config file, looked up from the working directory upward
//! 3. `SEMMUT_*` environment variables (`SEMMUT_SERVER__PORT=9000`)
//! 4. command-line overrides

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Json, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "localhost";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8888;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default Mutalyzer service description.
pub const DEFAULT_SOAP_URL: &str = "https://mutalyzer.nl/services/?wsdl";

/// Target namespace of the Mutalyzer services.
pub const DEFAULT_NAMESPACE: &str = "http://mutalyzer.nl/2.0/services";

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "SEMMUT_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Server port must be greater than 0")]
    InvalidPort,

    #[error("Upstream SOAP URL cannot be empty")]
    EmptySoapUrl,

    #[error("Invalid upstream SOAP URL '{url}': {reason}")]
    InvalidSoapUrl { url: String, reason: String },
}

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub logging: LoggingConfig,
    pub docs: DocsConfig,
    pub cors: CorsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Mutalyzer SOAP service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub soap_url: String,
    pub namespace: String,
    /// No timeout unless set
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log every error passing through the error chain
    pub error_log: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Static API documentation served under `/docs`
    pub dir: Option<PathBuf>,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub soap_url: Option<String>,
    pub docs_dir: Option<PathBuf>,
    pub quiet: bool,
}

impl ConfigOverrides {
    fn provider(&self) -> Figment {
        let mut figment = Figment::new();
        if let Some(host) = &self.host {
            figment = figment.merge(("server.host", host));
        }
        if let Some(port) = self.port {
            figment = figment.merge(("server.port", port));
        }
        if let Some(url) = &self.soap_url {
            figment = figment.merge(("upstream.soap_url", url));
        }
        if let Some(dir) = &self.docs_dir {
            figment = figment.merge(("docs.dir", dir));
        }
        if self.quiet {
            figment = figment.merge(("logging.error_log", false));
        }
        figment
    }
}

impl Config {
    /// The layered configuration sources, without extraction
    pub fn figment(config_file: &Path, overrides: &ConfigOverrides) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match find_config_file(config_file) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Using configuration file");
                figment = figment.merge(Json::file(path));
            },
            None => {
                tracing::debug!(file = %config_file.display(), "No configuration file found");
            },
        }

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(overrides.provider())
    }

    /// Load and validate configuration
    pub fn load(config_file: &Path, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config: Config = Self::figment(config_file, overrides)
            .extract()
            .map_err(Box::new)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        self.upstream.endpoint()?;

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl UpstreamConfig {
    /// Service endpoint: the configured URL without its `wsdl` query
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        if self.soap_url.trim().is_empty() {
            return Err(ConfigError::EmptySoapUrl);
        }

        let mut url = Url::parse(self.soap_url.trim()).map_err(|e| ConfigError::InvalidSoapUrl {
            url: self.soap_url.clone(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidSoapUrl {
                url: self.soap_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !key.eq_ignore_ascii_case("wsdl"))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }

        Ok(url)
    }
}

/// Look for `file` in the working directory and then in each parent.
///
/// Absolute paths are only checked as given.
pub fn find_config_file(file: &Path) -> Option<PathBuf> {
    if file.is_absolute() {
        return file.is_file().then(|| file.to_path_buf());
    }

    let cwd = std::env::current_dir().ok()?;
    cwd.ancestors()
        .map(|dir| dir.join(file))
        .find(|candidate| candidate.is_file())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            soap_url: DEFAULT_SOAP_URL.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            request_timeout_secs: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { error_log: true }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: false,
        }
    }
}
