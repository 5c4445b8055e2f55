use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("store error: {0}")]
    Store(#[from] wxbridge_store::StoreError),

    #[error("client error: {0}")]
    Client(#[from] wxbridge_client::ClientError),

    #[error("platform error: {0}")]
    Platform(#[from] wxbridge_platform::PlatformError),

    #[error("chat {chat_key} is overloaded: {depth} units already queued")]
    Overload { chat_key: String, depth: usize },
}

pub type Result<T> = std::result::Result<T, DeliveryError>;
