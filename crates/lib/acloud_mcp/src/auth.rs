//! MCP bearer token authentication middleware for the HTTP transport.
//!
//! The configured token is kept only as a SHA-256 digest; presented tokens
//! are hashed and compared digest to digest.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Static bearer token guarding the HTTP transport.
#[derive(Clone)]
pub struct McpAccessToken {
    digest: [u8; 32],
}

impl McpAccessToken {
    pub fn new(token: &str) -> Self {
        Self {
            digest: Sha256::digest(token.as_bytes()).into(),
        }
    }

    pub fn matches(&self, presented: &str) -> bool {
        let presented: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
        presented == self.digest
    }
}

impl std::fmt::Debug for McpAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("McpAccessToken(<redacted>)")
    }
}

/// Axum middleware: validates the MCP bearer token.
///
/// Returns 401 if the header is missing, is not a `Bearer` credential, or
/// carries the wrong token.
pub async fn mcp_auth_middleware(
    State(expected): State<Arc<McpAccessToken>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = match request.headers().get(AUTHORIZATION) {
        Some(header) => {
            let header_str = header.to_str().unwrap_or("");
            match header_str.strip_prefix("Bearer ") {
                Some(t) => t.trim(),
                None => {
                    debug!("MCP auth: missing Bearer prefix");
                    return Err(StatusCode::UNAUTHORIZED);
                }
            }
        }
        None => {
            debug!("MCP auth: no Authorization header");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    if !expected.matches(token) {
        debug!("MCP auth: token mismatch");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(request).await)
}
