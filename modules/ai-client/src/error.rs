use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    /// The provider answered 429: usage quota or rate limit exhausted.
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// The provider answered 401 or 403: credentials missing, expired or revoked.
    #[error("Unauthorized (status {status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Response contained no text")]
    EmptyResponse,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AiError::RateLimited(_))
    }

    /// No later call with the same credentials can succeed either.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, AiError::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Network(err.to_string())
    }
}
