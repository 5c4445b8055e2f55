use thiserror::Error;

/// Top-level error composed from every subsystem's own error type.
///
/// Individual crates (store, client, rules, platform, delivery, supervisor,
/// monitor) define their own `thiserror` enums; this one unifies them at
/// boundaries that must speak a single error type, such as the gateway's
/// HTTP handlers.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("overloaded: {0}")]
    Overload(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Stable machine-readable code for logs and the `/health` surface.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "CONFIG_ERROR",
            BridgeError::Network(_) => "NETWORK_ERROR",
            BridgeError::Timeout(_) => "TIMEOUT",
            BridgeError::Auth(_) => "AUTH_ERROR",
            BridgeError::Protocol(_) => "PROTOCOL_ERROR",
            BridgeError::Platform(_) => "PLATFORM_ERROR",
            BridgeError::Store(_) => "STORE_ERROR",
            BridgeError::Overload(_) => "OVERLOAD_ERROR",
            BridgeError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
