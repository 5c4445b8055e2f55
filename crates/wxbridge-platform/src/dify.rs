use crate::error::{PlatformError, Result};
use crate::platform::{api_error, InboundUnit, OutboundReply, Platform, SendMode};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct DifyConfig {
    pub api_base: String,
    pub api_key: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub send_mode: SendMode,
}

fn default_user_id() -> String {
    "wxbridge".to_string()
}

/// "Conversation" LLM platform (dify-shaped). Caches the server-assigned
/// `conversation_id` per chat so the next turn continues the conversation.
pub struct DifyPlatform {
    client: reqwest::Client,
    config: DifyConfig,
    conversations: Mutex<HashMap<String, String>>,
}

impl DifyPlatform {
    pub fn new(config: DifyConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    fn cached_conversation_id(&self, chat_name: &str) -> Option<String> {
        self.conversations.lock().unwrap().get(chat_name).cloned()
    }

    fn cache_conversation_id(&self, chat_name: &str, id: String) {
        self.conversations.lock().unwrap().insert(chat_name.to_string(), id);
    }

    /// Uploads a non-text inbound unit's content to `/files/upload` and
    /// returns the id to embed in the `files` array. The message pipeline
    /// only carries already-flattened text, so the upload body is that text
    /// tagged with its original message kind rather than the original bytes.
    async fn upload_attachment(&self, unit: &InboundUnit) -> Result<String> {
        let url = format!("{}/files/upload", self.config.api_base.trim_end_matches('/'));
        let file_name = format!("{}.txt", unit.message_type);
        let part = reqwest::multipart::Part::bytes(unit.content.clone().into_bytes()).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .text("user", self.config.user_id.clone())
            .part("file", part);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "file upload to conversation platform failed");
            return Err(api_error(status, text));
        }

        let parsed: FileUploadResponse = resp.json().await.map_err(|e| PlatformError::Parse(e.to_string()))?;
        Ok(parsed.id)
    }
}

fn dify_file_type(message_type: &str) -> &'static str {
    match message_type {
        "image" => "image",
        "video" => "video",
        "voice" | "audio" => "audio",
        _ => "document",
    }
}

#[async_trait]
impl Platform for DifyPlatform {
    fn kind(&self) -> &'static str {
        "dify"
    }

    async fn initialize(&self) -> Result<()> {
        if self.config.api_base.is_empty() || self.config.api_key.is_empty() {
            return Err(PlatformError::Config("api_base and api_key are required".into()));
        }
        Ok(())
    }

    async fn process(&self, unit: &InboundUnit) -> Result<OutboundReply> {
        let conversation_id = self.cached_conversation_id(&unit.chat_name);

        let mut body = serde_json::json!({
            "query": unit.content,
            "inputs": {},
            "response_mode": "blocking",
            "user": self.config.user_id,
        });
        if let Some(id) = &conversation_id {
            body["conversation_id"] = serde_json::json!(id);
        }
        if unit.message_type != "text" {
            let file_id = self.upload_attachment(unit).await?;
            body["files"] = serde_json::json!([{
                "type": dify_file_type(&unit.message_type),
                "transfer_method": "local_file",
                "upload_file_id": file_id,
            }]);
        }

        let url = format!("{}/chat-messages", self.config.api_base.trim_end_matches('/'));
        debug!(chat = %unit.chat_name, has_conversation = conversation_id.is_some(), "sending request to conversation platform");

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
            warn!(status = %status, body = %text, "conversation platform returned an error");
            return Err(api_error(status, text));
        }

        let parsed: ConversationResponse =
            resp.json().await.map_err(|e| PlatformError::Parse(e.to_string()))?;

        self.cache_conversation_id(&unit.chat_name, parsed.conversation_id);

        Ok(OutboundReply {
            content: parsed.answer,
            should_reply: true,
            send_mode: self.config.send_mode,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ConversationResponse {
    answer: String,
    conversation_id: String,
}

#[derive(Debug, Deserialize)]
struct FileUploadResponse {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_cache_is_keyed_per_chat() {
        let platform = DifyPlatform::new(DifyConfig {
            api_base: "http://localhost".into(),
            api_key: "key".into(),
            user_id: default_user_id(),
            send_mode: SendMode::default(),
        });
        assert!(platform.cached_conversation_id("alice").is_none());
        platform.cache_conversation_id("alice", "conv-1".into());
        assert_eq!(platform.cached_conversation_id("alice").as_deref(), Some("conv-1"));
        assert!(platform.cached_conversation_id("bob").is_none());
    }

    #[test]
    fn dify_file_type_maps_known_message_kinds() {
        assert_eq!(dify_file_type("image"), "image");
        assert_eq!(dify_file_type("voice"), "audio");
        assert_eq!(dify_file_type("unknown"), "document");
    }
}
