/// Currency Converter MCP Server
///
/// Serves the `currency-converter` tool over MCP. Transport and server metadata
/// come from environment variables (see `core::config`). Logs go to stderr so
/// the STDIO transport keeps stdout for JSON-RPC; the filter is read from
/// RUST_LOG and defaults to `info`.

mod core;
mod tools;

use tracing_subscriber::EnvFilter;

use crate::core::config::Config;
use crate::core::server;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    tracing::debug!(?config, "loaded configuration");
    server::run(config).await
}
