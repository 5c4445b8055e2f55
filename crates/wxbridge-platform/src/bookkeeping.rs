use crate::error::{PlatformError, Result};
use crate::platform::{api_error, InboundUnit, OutboundReply, Platform, SendMode};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use wxbridge_store::{NewAccountingRecord, Store};
use wxbridge_core::PlatformId;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct BookkeepingConfig {
    pub server_url: String,
    pub username: String,
    pub password: String,
    pub account_book_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub send_mode: SendMode,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Default)]
struct TokenState {
    token: Option<String>,
    expires_at: i64,
}

/// Bookkeeping platform ("zhiweijz"-shaped). Maintains a bearer token with
/// refresh and appends every attempt to the accounting ledger, success or
/// failure, so the operator can audit what was (or wasn't) recorded.
pub struct BookkeepingPlatform {
    client: reqwest::Client,
    config: BookkeepingConfig,
    platform_id: PlatformId,
    store: std::sync::Arc<Store>,
    token: RwLock<TokenState>,
}

impl BookkeepingPlatform {
    pub fn new(config: BookkeepingConfig, platform_id: PlatformId, store: std::sync::Arc<Store>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .expect("reqwest client builder should not fail with static config"),
            config,
            platform_id,
            store,
            token: RwLock::new(TokenState::default()),
        }
    }

    async fn ensure_token(&self, now: i64) -> Result<String> {
        {
            let state = self.token.read().await;
            if let Some(token) = &state.token {
                if state.expires_at > now {
                    return Ok(token.clone());
                }
            }
        }
        self.refresh_token(now).await
    }

    async fn refresh_token(&self, now: i64) -> Result<String> {
        let url = format!("{}/api/auth/login", self.config.server_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PlatformError::Auth(format!("login failed: {}", resp.status())));
        }

        let parsed: LoginResponse = resp.json().await.map_err(|e| PlatformError::Parse(e.to_string()))?;
        let mut state = self.token.write().await;
        state.token = Some(parsed.token.clone());
        state.expires_at = now + parsed.expires_in_secs;
        Ok(parsed.token)
    }
}

#[async_trait]
impl Platform for BookkeepingPlatform {
    fn kind(&self) -> &'static str {
        "zhiweijz"
    }

    async fn initialize(&self) -> Result<()> {
        if self.config.server_url.is_empty() || self.config.account_book_id.is_empty() {
            return Err(PlatformError::Config(
                "server_url and account_book_id are required".into(),
            ));
        }
        Ok(())
    }

    async fn process(&self, unit: &InboundUnit) -> Result<OutboundReply> {
        let now = current_unix_time();
        let started = std::time::Instant::now();
        let token = self.ensure_token(now).await?;

        let url = format!("{}/transactions/smart", self.config.server_url.trim_end_matches('/'));
        debug!(chat = %unit.chat_name, "sending request to bookkeeping platform");

        let result = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "description": unit.content,
                "account_book_id": self.config.account_book_id,
            }))
            .send()
            .await;

        let processing_time = started.elapsed().as_millis() as i64;
        let outcome = match result {
            Ok(resp) if resp.status().is_success() => {
                let parsed: SmartTransactionResponse =
                    resp.json().await.map_err(|e| PlatformError::Parse(e.to_string()))?;
                Ok(parsed)
            }
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                warn!(status = %status, body = %text, "bookkeeping platform returned an error");
                Err(api_error(status, text))
            }
            Err(e) => Err(PlatformError::Http(e)),
        };

        let record = match &outcome {
            Ok(parsed) => NewAccountingRecord {
                platform_id: self.platform_id.clone(),
                message_ref: unit.chat_name.clone(),
                description: unit.content.clone(),
                amount: parsed.amount,
                category: parsed.category.clone(),
                account_book_id: Some(self.config.account_book_id.clone()),
                success: true,
                error_message: None,
                processing_time,
                create_time: now,
            },
            Err(e) => NewAccountingRecord {
                platform_id: self.platform_id.clone(),
                message_ref: unit.chat_name.clone(),
                description: unit.content.clone(),
                amount: None,
                category: None,
                account_book_id: Some(self.config.account_book_id.clone()),
                success: false,
                error_message: Some(e.to_string()),
                processing_time,
                create_time: now,
            },
        };
        if let Err(e) = self.store.append_accounting_record(&record) {
            warn!(error = %e, "failed to append accounting record");
        }

        let parsed = outcome?;
        Ok(OutboundReply {
            content: parsed.confirmation,
            should_reply: true,
            send_mode: self.config.send_mode,
        })
    }
}

fn current_unix_time() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    expires_in_secs: i64,
}

#[derive(Debug, Deserialize)]
struct SmartTransactionResponse {
    confirmation: String,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    category: Option<String>,
}
