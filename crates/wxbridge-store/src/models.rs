use serde::{Deserialize, Serialize};
use wxbridge_core::{InstanceId, PlatformId, RuleId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: InstanceId,
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerStatus {
    Active,
    Inactive,
}

impl ListenerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerStatus::Active => "active",
            ListenerStatus::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for ListenerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ListenerStatus::Active),
            "inactive" => Ok(ListenerStatus::Inactive),
            other => Err(format!("unknown listener status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listener {
    pub instance_id: InstanceId,
    pub chat_name: String,
    pub status: ListenerStatus,
    pub last_message_time: i64,
    pub manual_added: bool,
    pub fixed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Listener {
    /// Exempt from the reaper loop.
    pub fn is_reap_exempt(&self) -> bool {
        self.manual_added || self.fixed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    File,
    Voice,
    Video,
    Card,
    SelfMsg,
    Time,
    Other,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::File => "file",
            MessageType::Voice => "voice",
            MessageType::Video => "video",
            MessageType::Card => "card",
            MessageType::SelfMsg => "self",
            MessageType::Time => "time",
            MessageType::Other => "other",
        }
    }

    /// Messages of these types are dropped during ingest, never persisted.
    pub fn is_dropped_at_ingest(&self) -> bool {
        matches!(self, MessageType::SelfMsg | MessageType::Time)
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "file" => Ok(MessageType::File),
            "voice" => Ok(MessageType::Voice),
            "video" => Ok(MessageType::Video),
            "card" => Ok(MessageType::Card),
            "self" => Ok(MessageType::SelfMsg),
            "time" => Ok(MessageType::Time),
            _ => Ok(MessageType::Other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i64)]
pub enum DeliveryStatus {
    None = 0,
    Success = 1,
    Failed = 2,
}

impl DeliveryStatus {
    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => DeliveryStatus::Success,
            2 => DeliveryStatus::Failed,
            _ => DeliveryStatus::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i64)]
pub enum ReplyStatus {
    None = 0,
    Success = 1,
    Failed = 2,
}

impl ReplyStatus {
    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => ReplyStatus::Success,
            2 => ReplyStatus::Failed,
            _ => ReplyStatus::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub message_id: String,
    pub instance_id: InstanceId,
    pub chat_name: String,
    pub sender: String,
    pub sender_remark: Option<String>,
    pub content: String,
    pub message_type: MessageType,
    pub create_time: i64,
    pub fingerprint: String,
    pub processed: bool,
    pub delivery_status: DeliveryStatus,
    pub delivery_time: Option<i64>,
    pub platform_id: Option<PlatformId>,
    pub reply_content: Option<String>,
    pub reply_status: ReplyStatus,
    pub reply_time: Option<i64>,
    pub retry_count: u32,
    pub next_retry_at: Option<i64>,
    pub last_error: Option<String>,
}

/// A fresh message prepared by ingest, not yet assigned a row id.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub message_id: String,
    pub instance_id: InstanceId,
    pub chat_name: String,
    pub sender: String,
    pub sender_remark: Option<String>,
    pub content: String,
    pub message_type: MessageType,
    pub create_time: i64,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    Dify,
    Openai,
    Keyword,
    Zhiweijz,
}

impl PlatformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Dify => "dify",
            PlatformKind::Openai => "openai",
            PlatformKind::Keyword => "keyword",
            PlatformKind::Zhiweijz => "zhiweijz",
        }
    }
}

impl std::str::FromStr for PlatformKind {
    type Err = String;

    /// `keyword_match` is accepted as a deprecated read-only alias for
    /// `keyword`; it is never re-serialized back out under that name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dify" => Ok(PlatformKind::Dify),
            "openai" => Ok(PlatformKind::Openai),
            "keyword" | "keyword_match" => Ok(PlatformKind::Keyword),
            "zhiweijz" => Ok(PlatformKind::Zhiweijz),
            other => Err(format!("unknown platform kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    pub platform_id: PlatformId,
    pub name: String,
    pub kind: PlatformKind,
    /// Opaque per-variant config, serialized as JSON and interpreted by
    /// `wxbridge-platform`'s registry at construction time.
    pub config: serde_json::Value,
    pub enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: RuleId,
    pub name: String,
    pub instance_selector: String,
    pub chat_pattern: String,
    pub platform_id: PlatformId,
    pub priority: i64,
    pub enabled: bool,
    pub only_at_messages: bool,
    pub at_name: Option<String>,
    pub reply_at_sender: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedListener {
    pub id: String,
    pub session_name: String,
    pub enabled: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingRecord {
    pub id: i64,
    pub platform_id: PlatformId,
    pub message_ref: String,
    pub description: String,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub account_book_id: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub processing_time: i64,
    pub create_time: i64,
}

#[derive(Debug, Clone)]
pub struct NewAccountingRecord {
    pub platform_id: PlatformId,
    pub message_ref: String,
    pub description: String,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub account_book_id: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub processing_time: i64,
    pub create_time: i64,
}
