use crate::error::{PlatformError, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// One inbound unit handed to a platform: either a single message or a
/// merged run of same-chat messages, already flattened to text.
#[derive(Debug, Clone)]
pub struct InboundUnit {
    pub instance_id: String,
    pub chat_name: String,
    pub sender: String,
    pub sender_remark: Option<String>,
    pub content: String,
    pub is_group_chat: bool,
    /// `"text"` for ordinary chat turns; anything else names the original
    /// non-text message kind (image, voice, ...) so a platform that embeds
    /// attachments knows there was one, even though the content itself is
    /// already flattened to text by the time it reaches here.
    pub message_type: String,
}

/// How the delivery pipeline should present a reply to the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    #[default]
    Normal,
    /// Signal the client's typing indicator before the reply text is sent.
    Typing,
}

#[derive(Debug, Clone)]
pub struct OutboundReply {
    pub content: String,
    pub should_reply: bool,
    pub send_mode: SendMode,
}

/// Common interface for every conversational/keyword/bookkeeping backend.
/// Mirrors the LLM-provider abstraction: one trait, default methods for the
/// parts most variants don't need to override.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Type tag as persisted on the Platform row (`openai`, `dify`, ...).
    fn kind(&self) -> &'static str;

    /// Validate config at construction time, not at first use.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn process(&self, unit: &InboundUnit) -> Result<OutboundReply>;

    /// Connectivity check surfaced through the management API; default
    /// no-op for platforms without a cheap probe endpoint.
    async fn test(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn api_error(status: reqwest::StatusCode, message: impl Into<String>) -> PlatformError {
    PlatformError::Api {
        status: status.as_u16(),
        message: message.into(),
    }
}
