use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteMessage {
    pub message_id: String,
    pub sender: String,
    #[serde(default)]
    pub sender_remark: Option<String>,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub create_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MainWindowChat {
    pub chat_name: String,
    pub messages: Vec<RemoteMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddListenerOptions {
    pub save_pic: bool,
    pub save_video: bool,
    pub save_file: bool,
    pub save_voice: bool,
    pub parse_url: bool,
}

impl Default for AddListenerOptions {
    fn default() -> Self {
        Self {
            save_pic: false,
            save_video: false,
            save_file: false,
            save_voice: false,
            parse_url: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

/// Connectivity snapshot for one client, read without locking the call path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Connecting,
    Disconnected,
    Error(String),
}
