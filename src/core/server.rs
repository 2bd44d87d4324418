/// MCP Server Implementation
///
/// This module contains the host-facing side of the servlet:
/// - JSON-RPC 2.0 request/response structures
/// - The `Servlet` trait and the registry routing tool names to servlets
/// - Method dispatch shared by both transports
/// - HTTP server setup with Actix Web
/// - STDIO server implementation for line-based communication

use actix_web::{
    web, App, HttpServer, HttpResponse, Result,
    middleware::{Compress, Logger, DefaultHeaders},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::core::config::{Config, Transport};
use crate::core::protocol::{
    CallToolRequest, CallToolResult, ContentItem, ContentType, ListToolsResult, ToolDescription,
};
use crate::tools;

const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

/// Server metadata reported in `initialize` responses.
#[derive(Clone, Debug)]
pub struct AppState {
    pub server_name: String,
    pub server_version: String,
}

/// JSON-RPC 2.0 request structure for MCP protocol.
///
/// `id` is None for notifications, which never receive a response.
#[derive(Deserialize, Debug)]
pub struct MCPRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<serde_json::Value>,
    method: String,
    params: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response structure. Exactly one of `result` and `error` is set.
#[derive(Serialize, Debug)]
pub struct MCPResponse {
    jsonrpc: String,
    id: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<MCPError>,
}

impl MCPResponse {
    fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Option<serde_json::Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(MCPError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// JSON-RPC 2.0 error structure.
#[derive(Serialize, Debug)]
pub struct MCPError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

/// Protocol-level failures of a tool call.
///
/// These mean the call could not be attempted at all. Failures of the tool's
/// own logic are reported inside a `CallToolResult` instead.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

/// A plugin exposing one or more tools through the describe/call contract.
///
/// Calls are independent: implementations hold no per-call state, so the host
/// may invoke `call` concurrently.
#[async_trait]
pub trait Servlet: Send + Sync {
    /// Static metadata for every tool this servlet serves.
    fn describe(&self) -> ListToolsResult;

    /// Execute the tool named in `input.params.name`.
    async fn call(&self, input: CallToolRequest) -> Result<CallToolResult, CallError>;
}

/// Registry of available MCP tools.
///
/// Keeps the tool descriptions for discovery and a map of tool names to the
/// servlet serving them for execution.
pub struct ToolRegistry {
    pub tools: Vec<ToolDescription>,
    pub handlers: HashMap<String, Arc<dyn Servlet>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    /// Register every tool a servlet describes.
    pub fn register(&mut self, servlet: Arc<dyn Servlet>) {
        for tool in servlet.describe().tools {
            tracing::debug!(tool = %tool.name, "registered tool");
            self.handlers.insert(tool.name.clone(), Arc::clone(&servlet));
            self.tools.push(tool);
        }
    }

    pub fn list(&self) -> ListToolsResult {
        ListToolsResult {
            tools: self.tools.clone(),
        }
    }

    /// Route a call to the servlet owning `input.params.name`.
    pub async fn call(&self, input: CallToolRequest) -> Result<CallToolResult, CallError> {
        match self.handlers.get(&input.params.name) {
            Some(servlet) => servlet.call(input).await,
            None => Err(CallError::UnknownTool(input.params.name)),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the registry with every tool this server exposes.
pub fn initialize_tools() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    tools::currency::register(&mut registry);
    Arc::new(registry)
}

/// Dispatch one JSON-RPC request. Returns None for notifications.
pub async fn dispatch(state: &AppState, registry: &ToolRegistry, req: MCPRequest) -> Option<MCPResponse> {
    if req.id.is_none() {
        tracing::debug!(method = %req.method, "notification");
        return None;
    }

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(state, req.id),
        "tools/list" => handle_tools_list(registry, req.id),
        "tools/call" => handle_tools_call(registry, req.id, req.params).await,
        _ => MCPResponse::failure(req.id, METHOD_NOT_FOUND, format!("Method not found: {}", req.method)),
    };
    Some(response)
}

/// Handle MCP initialize method.
fn handle_initialize(state: &AppState, id: Option<serde_json::Value>) -> MCPResponse {
    MCPResponse::success(
        id,
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": state.server_name,
                "version": state.server_version
            }
        }),
    )
}

/// Handle MCP tools/list method.
fn handle_tools_list(registry: &ToolRegistry, id: Option<serde_json::Value>) -> MCPResponse {
    match serde_json::to_value(registry.list()) {
        Ok(result) => MCPResponse::success(id, result),
        Err(e) => MCPResponse::failure(id, INTERNAL_ERROR, format!("Failed to list tools: {}", e)),
    }
}

/// Handle MCP tools/call method.
///
/// Malformed params and unknown tools are protocol errors. Whatever the tool
/// returns, including results with `isError` set, is passed through as-is.
async fn handle_tools_call(
    registry: &ToolRegistry,
    id: Option<serde_json::Value>,
    params: Option<serde_json::Value>,
) -> MCPResponse {
    let Some(params) = params else {
        return MCPResponse::failure(id, INVALID_PARAMS, "Invalid params");
    };

    let input: CallToolRequest = match serde_json::from_value(serde_json::json!({ "params": params })) {
        Ok(input) => input,
        Err(e) => {
            return MCPResponse::failure(id, INVALID_PARAMS, format!("Invalid params: {}", e));
        }
    };

    let tool = input.params.name.clone();
    match registry.call(input).await {
        Ok(result) => {
            if result.is_error() {
                let message = result.content.iter().find_map(ContentItem::as_text).unwrap_or_default();
                tracing::info!(tool = %tool, error = %message, "tool reported an error");
            } else {
                let content: Vec<ContentType> = result.content.iter().map(ContentItem::content_type).collect();
                tracing::info!(tool = %tool, ?content, "tool call finished");
            }
            match serde_json::to_value(result) {
                Ok(result) => MCPResponse::success(id, result),
                Err(e) => MCPResponse::failure(id, INTERNAL_ERROR, format!("Failed to encode result: {}", e)),
            }
        }
        Err(e) => {
            tracing::warn!(tool = %tool, error = %e, "tool call rejected");
            MCPResponse::failure(id, METHOD_NOT_FOUND, e.to_string())
        }
    }
}

/// Health check endpoint handler.
async fn health(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": state.server_name
    })))
}

/// MCP JSON-RPC request handler for HTTP mode.
///
/// Counts every request for the metrics endpoint. Notifications are answered
/// with 202 Accepted and an empty body.
async fn mcp_handler(
    state: web::Data<AppState>,
    registry: web::Data<Arc<ToolRegistry>>,
    counter: web::Data<AtomicU64>,
    req: web::Json<MCPRequest>,
) -> Result<HttpResponse> {
    counter.fetch_add(1, Ordering::Relaxed);

    match dispatch(&state, &registry, req.into_inner()).await {
        Some(response) => Ok(HttpResponse::Ok().json(response)),
        None => Ok(HttpResponse::Accepted().finish()),
    }
}

/// Metrics endpoint: total requests processed since start.
async fn metrics_handler(counter: web::Data<AtomicU64>) -> Result<HttpResponse> {
    let count = counter.load(Ordering::Relaxed);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "requests_total": count,
        "status": "ok"
    })))
}

/// Server-Sent Events endpoint for tools discovery.
///
/// Emits a single event carrying the tools/list payload and a count.
async fn sse_tools_discovery(registry: web::Data<Arc<ToolRegistry>>) -> Result<HttpResponse> {
    use actix_web::http::header;

    let tools_data = serde_json::json!({
        "tools": registry.list().tools,
        "count": registry.tools.len()
    });

    let sse_data = format!(
        "data: {}\n\n",
        serde_json::to_string(&tools_data).unwrap_or_else(|_| "{}".to_string())
    );

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(header::CacheControl(vec![
            header::CacheDirective::NoCache,
            header::CacheDirective::NoStore,
            header::CacheDirective::MustRevalidate,
        ]))
        .insert_header(("x-accel-buffering", "no"))
        .body(sse_data))
}

/// Route table shared by the server and its tests.
fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/sse", web::get().to(sse_tools_discovery))
        .route("/mcp", web::post().to(mcp_handler))
        .route("/", web::post().to(mcp_handler))
        .route("/", web::get().to(health));
}

/// Run the configured transport(s) until they exit.
///
/// In `both` mode the STDIO loop runs in a background task and is aborted when
/// the HTTP server stops.
pub async fn run(config: Config) -> std::io::Result<()> {
    let state = AppState {
        server_name: config.server_name.clone(),
        server_version: config.server_version.clone(),
    };
    let registry = initialize_tools();

    match config.transport {
        Transport::Stdio => run_server_stdio(state, registry).await,
        Transport::Http => run_server_http(state, registry, &config).await,
        Transport::Both => {
            let stdio_state = state.clone();
            let stdio_registry = Arc::clone(&registry);
            let stdio_handle = tokio::spawn(async move {
                if let Err(e) = run_server_stdio(stdio_state, stdio_registry).await {
                    tracing::error!(error = %e, "STDIO server error");
                }
            });

            let http_result = run_server_http(state, registry, &config).await;
            stdio_handle.abort();
            http_result
        }
    }
}

/// Run the MCP server in HTTP mode.
///
/// Worker count comes from the configuration; connection limits and timeouts
/// are fixed.
pub async fn run_server_http(state: AppState, registry: Arc<ToolRegistry>, config: &Config) -> std::io::Result<()> {
    let bind_addr = format!("{}:{}", config.host, config.port);

    let app_state = web::Data::new(state);
    let tool_registry = web::Data::new(registry);
    let request_count = web::Data::new(AtomicU64::new(0));

    tracing::info!(
        name = %app_state.server_name,
        version = %app_state.server_version,
        bind = %bind_addr,
        workers = config.workers,
        "MCP server starting (HTTP mode)"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(tool_registry.clone())
            .app_data(request_count.clone())
            .wrap(Compress::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
            )
            // %r = request line, %s = status, %D = duration in ms
            .wrap(Logger::new("%r %s %Dms"))
            .configure(routes)
    })
    .workers(config.workers)
    .max_connections(10000)
    .max_connection_rate(1000)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}

/// Run the MCP server in STDIO mode.
///
/// Reads one JSON-RPC request per line from stdin and writes one response per
/// line to stdout. Requests are handled one at a time.
pub async fn run_server_stdio(state: AppState, registry: Arc<ToolRegistry>) -> std::io::Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

    tracing::info!(
        name = %state.server_name,
        version = %state.server_version,
        "MCP server starting (STDIO mode)"
    );

    let mut stdin = BufReader::with_capacity(8192, tokio::io::stdin()).lines();
    let mut stdout = BufWriter::with_capacity(8192, tokio::io::stdout());

    while let Some(line) = stdin.next_line().await? {
        let Some(response) = handle_line(&state, &registry, &line).await else {
            continue;
        };

        let response_json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response");
                continue;
            }
        };

        stdout.write_all(response_json.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    tracing::info!("stdin closed, STDIO server exiting");
    Ok(())
}

/// Parse and dispatch one STDIO line.
///
/// Unparsable lines get a parse error only when an `id` can still be recovered.
async fn handle_line(state: &AppState, registry: &ToolRegistry, line: &str) -> Option<MCPResponse> {
    if line.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<MCPRequest>(line) {
        Ok(req) => dispatch(state, registry, req).await,
        Err(e) => {
            tracing::warn!(error = %e, "parse error");
            let partial = serde_json::from_str::<serde_json::Value>(line).ok()?;
            let id = partial.get("id")?.clone();
            Some(MCPResponse::failure(Some(id), PARSE_ERROR, format!("Parse error: {}", e)))
        }
    }
}
