//! Error taxonomy for the Arduino Cloud client.

use thiserror::Error;

pub type Result<T> = core::result::Result<T, CloudError>;

/// Arduino Cloud client errors.
#[derive(Debug, Error)]
pub enum CloudError {
    /// The client-credentials exchange failed. No token was cached.
    #[error("Failed to get access token: {0}")]
    Auth(String),

    /// A resource endpoint call failed (transport fault or non-2xx status).
    #[error("Failed to {operation}: {message}")]
    RemoteCall {
        operation: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// A light-family property had no value encoding.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A light write failed; writes after it were abandoned.
    #[error("Light control aborted after {} successful write(s): {source}", .applied.len())]
    LightControlAborted {
        applied: Vec<String>,
        #[source]
        source: Box<CloudError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CloudError {
    pub(crate) fn remote(operation: &'static str, message: impl Into<String>) -> Self {
        Self::RemoteCall {
            operation,
            status: None,
            message: message.into(),
        }
    }

    /// Whether this is a server-side or transport failure worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RemoteCall { status: None, .. } => true,
            Self::RemoteCall {
                status: Some(status),
                ..
            } => *status >= 500,
            _ => false,
        }
    }
}
