//! Semantic Mutalyzer Server - Main entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use semmut_common::logging::{init_logging, LogConfig};
use tracing::info;

use semmut_server::{
    api,
    config::{Config, ConfigOverrides, DEFAULT_CONFIG_FILE},
    upstream::SoapClient,
};

/// REST, JSON and Turtle gateway to the Mutalyzer web services
#[derive(Parser, Debug)]
#[command(name = "semmut-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file, searched from the working directory upward
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Mutalyzer SOAP service (WSDL) URL
    #[arg(long)]
    soap_url: Option<String>,

    /// Directory with the API documentation served under /docs
    #[arg(long)]
    docs_dir: Option<PathBuf>,

    /// Do not log errors returned to clients
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            soap_url: self.soap_url.clone(),
            docs_dir: self.docs_dir.clone(),
            quiet: self.quiet,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("semmut-server")
        .filter_directives("semmut_server=debug,tower_http=debug")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    info!("Starting Semantic Mutalyzer server");

    let config = Config::load(&cli.config, &cli.overrides())?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let client = SoapClient::new(&config.upstream).context("Failed to create the SOAP client")?;
    info!("Upstream client ready for {}", client.endpoint());

    api::serve(config, Arc::new(client)).await
}
