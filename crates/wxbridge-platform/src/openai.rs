use crate::error::{PlatformError, Result};
use crate::platform::{api_error, InboundUnit, OutboundReply, Platform, SendMode};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub send_mode: SendMode,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

pub struct OpenAiPlatform {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiPlatform {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Platform for OpenAiPlatform {
    fn kind(&self) -> &'static str {
        "openai"
    }

    async fn initialize(&self) -> Result<()> {
        if self.config.api_base.is_empty() || self.config.api_key.is_empty() {
            return Err(PlatformError::Config("api_base and api_key are required".into()));
        }
        Ok(())
    }

    async fn process(&self, unit: &InboundUnit) -> Result<OutboundReply> {
        let mut messages = Vec::new();
        if let Some(system) = &self.config.system_prompt {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": unit.content}));

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));
        debug!(model = %self.config.model, chat = %unit.chat_name, "sending request to chat-completions platform");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "chat-completions platform returned an error");
            return Err(api_error(status, text));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| PlatformError::Parse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(OutboundReply {
            content,
            should_reply: true,
            send_mode: self.config.send_mode,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<ChatCompletionsChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsChoice {
    message: ChatCompletionsMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initialize_rejects_empty_credentials() {
        let platform = OpenAiPlatform::new(OpenAiConfig {
            api_base: String::new(),
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
            send_mode: SendMode::default(),
        });
        assert!(platform.initialize().await.is_err());
    }
}
