//! Arduino Cloud MCP server binary.
//!
//! Serves the Arduino Cloud tools over stdio (the default, for hosts that
//! spawn the server as a child process) or over Streamable HTTP.
//! Logs always go to stderr so stdout stays reserved for the stdio protocol.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;

use acloud_core::config::{DEFAULT_API_BASE_URL, DEFAULT_AUDIENCE, DEFAULT_TOKEN_URL, parse_url};
use acloud_core::{ArduinoCloud, CloudConfig};
use acloud_mcp::McpAccessToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

/// CLI arguments for the Arduino Cloud MCP server.
#[derive(Parser)]
#[command(name = "acloud_server", version, about = "Arduino Cloud MCP server")]
struct Args {
    /// Arduino Cloud API client id.
    #[arg(long, env = "ARDUINO_CLOUD_CLIENT_ID", hide_env_values = true)]
    client_id: String,

    /// Arduino Cloud API client secret.
    #[arg(long, env = "ARDUINO_CLOUD_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Resource API base URL.
    #[arg(long, env = "ARDUINO_CLOUD_API_URL", default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// Client-credentials token endpoint.
    #[arg(long, env = "ARDUINO_CLOUD_TOKEN_URL", default_value = DEFAULT_TOKEN_URL)]
    token_url: String,

    /// Audience requested for the access token.
    #[arg(long, env = "ARDUINO_CLOUD_AUDIENCE", default_value = DEFAULT_AUDIENCE)]
    audience: String,

    /// Transport used to talk to the MCP host.
    #[arg(long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Port for the HTTP transport (0 = ephemeral). Always bound to 127.0.0.1.
    #[arg(long, default_value_t = 0)]
    port: u16,

    /// Bearer token required by the HTTP transport. Unset leaves it open.
    #[arg(long, env = "ACLOUD_MCP_TOKEN", hide_env_values = true)]
    mcp_token: Option<String>,

    /// Timeout for every outbound Arduino Cloud request, in seconds.
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// Lifetime of the thing metadata cache, in seconds.
    #[arg(long, default_value_t = 300)]
    cache_ttl_secs: u64,

    /// Extra attempts for reads that fail with a transport or 5xx error.
    #[arg(long, default_value_t = 0)]
    read_retries: u32,
}

impl Args {
    fn cloud_config(&self) -> Result<CloudConfig, acloud_core::CloudError> {
        let mut config = CloudConfig::new(&self.client_id, &self.client_secret)?;
        config.api_base_url = parse_url("api base URL", &self.api_base_url)?;
        config.token_url = parse_url("token URL", &self.token_url)?;
        config.audience = self.audience.clone();
        config.request_timeout = Duration::from_secs(self.request_timeout_secs);
        config.cache_ttl = Duration::from_secs(self.cache_ttl_secs);
        config.read_retries = self.read_retries;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Write logs to stderr so stdout is reserved for the stdio transport.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,acloud_core=debug,acloud_mcp=debug".into()),
        )
        .init();

    let args = Args::parse();
    let config = args.cloud_config()?;
    info!(
        api_base_url = %config.api_base_url,
        transport = ?args.transport,
        cache_ttl_secs = args.cache_ttl_secs,
        "starting acloud_server v{}",
        acloud_mcp::version()
    );

    let cloud = Arc::new(ArduinoCloud::new(config)?);

    match args.transport {
        Transport::Stdio => acloud_mcp::serve_stdio(cloud).await?,
        Transport::Http => {
            let ct = CancellationToken::new();
            let access_token = args.mcp_token.as_deref().map(McpAccessToken::new);
            if access_token.is_none() {
                info!("no MCP bearer token configured; HTTP endpoint is unauthenticated");
            }
            let app = acloud_mcp::mcp_router(cloud, ct.clone(), access_token);

            let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port)).await?;
            info!(addr = %listener.local_addr()?, "MCP server listening");

            tokio::spawn({
                let ct = ct.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("received Ctrl-C, shutting down");
                    }
                    ct.cancel();
                }
            });

            axum::serve(listener, app)
                .with_graceful_shutdown(async move { ct.cancelled().await })
                .await?;
        }
    }

    Ok(())
}
