use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TorControlError>;

#[derive(Debug, Error)]
pub enum TorControlError {
    #[error("Failed to connect to control port {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Control port did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Control port rejected authentication (515)")]
    AuthRejected,

    #[error("NEWNYM requested too soon (551)")]
    TooSoon,

    #[error("Unexpected control reply: {0}")]
    Protocol(String),

    #[error("Control port I/O error: {0}")]
    Io(#[from] std::io::Error),
}
