use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("store error: {0}")]
    Store(#[from] wxbridge_store::StoreError),

    #[error("client error: {0}")]
    Client(#[from] wxbridge_client::ClientError),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
