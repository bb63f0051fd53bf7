use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CdpError>;

#[derive(Error, Debug)]
pub enum CdpError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Protocol error {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("DevTools connection closed")]
    ConnectionClosed,

    #[error("Malformed DevTools message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CdpError {
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        CdpError::Timeout {
            what: what.into(),
            after,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CdpError::Timeout { .. })
    }
}
