//! # acloud_mcp
//!
//! MCP (Model Context Protocol) server exposing Arduino IoT Cloud devices,
//! things and properties as tools.
//!
//! Two transports are provided: stdio for hosts that spawn the server as a
//! child process, and Streamable HTTP with optional bearer authentication.

pub mod auth;
pub mod server;
pub mod tools;

use std::sync::Arc;

use rmcp::ServiceExt;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use acloud_core::ArduinoCloud;

pub use auth::McpAccessToken;
pub use server::ArduinoMcpServer;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Errors raised while running an MCP transport.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("MCP session initialization failed: {0}")]
    Init(String),

    #[error("MCP session task failed: {0}")]
    Session(String),
}

/// Serve one MCP session over stdin/stdout until the host disconnects.
pub async fn serve_stdio(cloud: Arc<ArduinoCloud>) -> Result<(), ServeError> {
    let service = ArduinoMcpServer::new(cloud)
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| ServeError::Init(e.to_string()))?;

    info!("Arduino Cloud MCP server running on stdio");
    service
        .waiting()
        .await
        .map_err(|e| ServeError::Session(e.to_string()))?;
    info!("stdio MCP session closed");
    Ok(())
}

/// Build an Axum router that serves the MCP Streamable HTTP endpoint at `/mcp`.
///
/// When `access_token` is set every request must carry
/// `Authorization: Bearer <token>`; otherwise the endpoint is open and should
/// only be bound to loopback.
///
/// # Arguments
///
/// * `cloud` — shared Arduino Cloud client; one per process, shared by all sessions.
/// * `ct` — cancellation token for graceful shutdown of SSE streams.
/// * `access_token` — optional static bearer token.
pub fn mcp_router(
    cloud: Arc<ArduinoCloud>,
    ct: CancellationToken,
    access_token: Option<McpAccessToken>,
) -> axum::Router {
    let service: StreamableHttpService<ArduinoMcpServer, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(ArduinoMcpServer::new(cloud.clone())),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                stateful_mode: true,
                cancellation_token: ct,
                ..Default::default()
            },
        );

    let router = axum::Router::new().nest_service("/mcp", service);
    match access_token {
        Some(token) => router.layer(axum::middleware::from_fn_with_state(
            Arc::new(token),
            auth::mcp_auth_middleware,
        )),
        None => router,
    }
}
