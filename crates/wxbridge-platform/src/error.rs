use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("platform unavailable: {0}")]
    Unavailable(String),

    #[error("platform call timed out after {0}ms")]
    Timeout(u64),
}

impl PlatformError {
    /// Transient failures are retried by the delivery pipeline with backoff;
    /// permanent ones fail the unit immediately.
    pub fn is_permanent(&self) -> bool {
        match self {
            PlatformError::Api { status, .. } => {
                matches!(*status, 401 | 403 | 404)
            }
            PlatformError::Auth(_) | PlatformError::Config(_) => true,
            PlatformError::Http(_) | PlatformError::Parse(_) | PlatformError::Unavailable(_) | PlatformError::Timeout(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;
