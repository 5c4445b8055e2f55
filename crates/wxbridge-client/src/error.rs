use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("protocol error: code={code} message={message}")]
    Protocol { code: i64, message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;
