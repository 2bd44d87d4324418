/// Core Server Framework Module
///
/// - config.rs: environment-driven server configuration
/// - protocol.rs: host contract types (tool descriptions, calls, results)
/// - server.rs: MCP server with HTTP and STDIO transports

pub mod config;
pub mod protocol;
pub mod server;
