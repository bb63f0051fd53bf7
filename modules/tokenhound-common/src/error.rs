use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenhoundError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Blocked by challenge page: {0}")]
    Blocked(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Navigation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl TokenhoundError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TokenhoundError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        TokenhoundError::Json {
            path: path.into(),
            source,
        }
    }

    /// Timeout-class failures warrant a new circuit before the next attempt.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TokenhoundError::Timeout(_))
    }
}
