use crate::bookkeeping::{BookkeepingConfig, BookkeepingPlatform};
use crate::dify::{DifyConfig, DifyPlatform};
use crate::error::{PlatformError, Result};
use crate::keyword::{KeywordConfig, KeywordPlatform};
use crate::openai::{OpenAiConfig, OpenAiPlatform};
use crate::platform::Platform;
use std::sync::Arc;
use wxbridge_core::PlatformId;
use wxbridge_store::{PlatformKind, Store};

/// Maps a platform's type tag to its constructor. `keyword_match` is
/// normalized to `keyword` by `PlatformKind::from_str` before it ever
/// reaches this registry.
pub struct PlatformRegistry {
    store: Arc<Store>,
}

impl PlatformRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Construct and validate a platform from its persisted row. Returns a
    /// `ConfigError`-equivalent if the stored JSON config doesn't match the
    /// variant's expected shape.
    pub async fn build(&self, platform_id: &PlatformId, kind: PlatformKind, config: &serde_json::Value) -> Result<Arc<dyn Platform>> {
        let platform: Arc<dyn Platform> = match kind {
            PlatformKind::Openai => {
                let cfg: OpenAiConfig = serde_json::from_value(config.clone())
                    .map_err(|e| PlatformError::Config(e.to_string()))?;
                Arc::new(OpenAiPlatform::new(cfg))
            }
            PlatformKind::Dify => {
                let cfg: DifyConfig = serde_json::from_value(config.clone())
                    .map_err(|e| PlatformError::Config(e.to_string()))?;
                Arc::new(DifyPlatform::new(cfg))
            }
            PlatformKind::Keyword => {
                let cfg: KeywordConfig = serde_json::from_value(config.clone())
                    .map_err(|e| PlatformError::Config(e.to_string()))?;
                Arc::new(KeywordPlatform::new(cfg))
            }
            PlatformKind::Zhiweijz => {
                let cfg: BookkeepingConfig = serde_json::from_value(config.clone())
                    .map_err(|e| PlatformError::Config(e.to_string()))?;
                Arc::new(BookkeepingPlatform::new(cfg, platform_id.clone(), self.store.clone()))
            }
        };
        platform.initialize().await?;
        Ok(platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_config_as_config_error() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let registry = PlatformRegistry::new(store);
        let err = registry
            .build(&PlatformId::from("p1"), PlatformKind::Openai, &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Config(_)));
    }

    #[tokio::test]
    async fn builds_keyword_platform_from_valid_config() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let registry = PlatformRegistry::new(store);
        let platform = registry
            .build(
                &PlatformId::from("p1"),
                PlatformKind::Keyword,
                &serde_json::json!({"rules": []}),
            )
            .await
            .unwrap();
        assert_eq!(platform.kind(), "keyword");
    }
}
