use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("store error: {0}")]
    Store(#[from] wxbridge_store::StoreError),

    #[error("invalid regex in chat_pattern of rule {rule_id}: {source}")]
    InvalidPattern {
        rule_id: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, RuleError>;
