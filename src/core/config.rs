/// Server Configuration
///
/// Configuration is read once at startup from environment variables. Missing or
/// unparsable numeric values fall back to defaults; an unknown transport mode is
/// an error.
///
/// Environment Variables:
/// - SERVER_NAME: Name of the server (default: "currency-converter")
/// - SERVER_VERSION: Version string (default: crate version)
/// - MCP_TRANSPORT_MODE: "stdio", "http", or "both" (default: "stdio")
/// - HOST: Bind address for HTTP mode (default: "0.0.0.0")
/// - PORT: Port number for HTTP mode (default: 3000)
/// - WORKER_THREADS: HTTP worker count (default: CPU count, max 16)

use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid transport mode '{0}', must be 'stdio', 'http', or 'both'")]
    InvalidTransport(String),
}

/// Which transport(s) the server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
    Both,
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            "both" => Ok(Transport::Both),
            _ => Err(ConfigError::InvalidTransport(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub server_name: String,
    pub server_version: String,
    pub transport: Transport,
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let transport = match lookup("MCP_TRANSPORT_MODE") {
            Some(mode) => mode.parse()?,
            None => Transport::Stdio,
        };

        Ok(Self {
            server_name: lookup("SERVER_NAME").unwrap_or_else(|| "currency-converter".to_string()),
            server_version: lookup("SERVER_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            transport,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("PORT")
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(3000),
            workers: lookup("WORKER_THREADS")
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or_else(|| num_cpus::get().clamp(1, 16)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.server_name, "currency-converter");
        assert_eq!(cfg.server_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(cfg.transport, Transport::Stdio);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 3000);
        assert!((1..=16).contains(&cfg.workers));
    }

    #[test]
    fn overrides_and_fallbacks() {
        let cfg = config(&[
            ("MCP_TRANSPORT_MODE", "HTTP"),
            ("PORT", "8080"),
            ("WORKER_THREADS", "not-a-number"),
        ])
        .unwrap();
        assert_eq!(cfg.transport, Transport::Http);
        assert_eq!(cfg.port, 8080);
        assert!((1..=16).contains(&cfg.workers));

        let cfg = config(&[("PORT", "99999"), ("WORKER_THREADS", "4")]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.workers, 4);
    }

    #[test]
    fn rejects_unknown_transport() {
        assert_eq!(
            config(&[("MCP_TRANSPORT_MODE", "carrier-pigeon")]),
            Err(ConfigError::InvalidTransport("carrier-pigeon".to_string()))
        );
    }
}
