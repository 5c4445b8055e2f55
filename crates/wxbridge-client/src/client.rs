use crate::error::{ClientError, Result};
use crate::types::{AddListenerOptions, Envelope, ConnectionState, MainWindowChat, RemoteMessage};
use reqwest::Client as HttpClient;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Consecutive call failures after which the client is treated as disconnected.
const DISCONNECT_THRESHOLD: u32 = 3;
/// Ceiling for the reconnect probe's exponential backoff.
const RECONNECT_BACKOFF_CAP_SECS: u64 = 60;

/// A single recorded call outcome, kept in a small ring for the monitor's
/// recent-error view and for the health score's connectivity fraction.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub op: &'static str,
    pub success: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

const STATS_RING_SIZE: usize = 64;

/// Typed HTTP access to one instance's remote automation endpoint.
///
/// Grounded on the `Channel` trait's split between a dumb transport (here,
/// a `reqwest::Client` + base URL + key) and a small, lock-free
/// connectivity state read by callers that don't want to pay for a mutex
/// on the hot path.
pub struct RemoteClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
    consecutive_failures: AtomicU32,
    state: Mutex<ConnectionState>,
    stats: Mutex<Vec<CallOutcome>>,
    suspended: std::sync::atomic::AtomicBool,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("reqwest client builder should not fail with static config");
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            consecutive_failures: AtomicU32::new(0),
            state: Mutex::new(ConnectionState::Connecting),
            stats: Mutex::new(Vec::with_capacity(STATS_RING_SIZE)),
            suspended: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.lock().unwrap().clone()
    }

    /// Suspends this client because its instance was disabled: the
    /// reconnect probe stands down and the connection state reads
    /// disconnected until `resume` is called.
    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::Relaxed);
        *self.state.lock().unwrap() = ConnectionState::Disconnected;
    }

    /// Re-arms the client after its instance is re-enabled; the next scan
    /// tick reconnects normally.
    pub fn resume(&self) {
        self.suspended.store(false, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *self.state.lock().unwrap() = ConnectionState::Connecting;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Relaxed)
    }

    pub fn recent_outcomes(&self) -> Vec<CallOutcome> {
        self.stats.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, success: bool, latency_ms: u64, error: Option<String>) {
        if success {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            *self.state.lock().unwrap() = ConnectionState::Connected;
        } else {
            let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            if failures >= DISCONNECT_THRESHOLD {
                *self.state.lock().unwrap() =
                    ConnectionState::Error(error.clone().unwrap_or_default());
            }
        }
        let mut stats = self.stats.lock().unwrap();
        if stats.len() == STATS_RING_SIZE {
            stats.remove(0);
        }
        stats.push(CallOutcome {
            op,
            success,
            latency_ms,
            error,
        });
    }

    /// True once three consecutive calls have failed; the supervisor uses
    /// this to pause polling for this instance and enter the reconnect probe.
    pub fn is_disconnected(&self) -> bool {
        self.consecutive_failures.load(Ordering::Relaxed) >= DISCONNECT_THRESHOLD
    }

    async fn call_json<T: serde::de::DeserializeOwned>(
        &self,
        op: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let started = std::time::Instant::now();
        let request = request.header("X-API-Key", &self.api_key);
        let result = request.send().await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let response = match result {
            Ok(resp) => resp,
            Err(e) => {
                let timed_out = e.is_timeout();
                self.record(op, false, latency_ms, Some(e.to_string()));
                return if timed_out {
                    Err(ClientError::Timeout(latency_ms))
                } else {
                    Err(ClientError::Network(e))
                };
            }
        };

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            self.record(op, false, latency_ms, Some("unauthorized".into()));
            return Err(ClientError::Auth(format!("status {}", response.status())));
        }

        let envelope: Envelope<T> = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                self.record(op, false, latency_ms, Some(e.to_string()));
                return Err(ClientError::Network(e));
            }
        };

        if envelope.code != 0 {
            let message = envelope.message.unwrap_or_default();
            self.record(op, false, latency_ms, Some(message.clone()));
            return Err(ClientError::Protocol {
                code: envelope.code,
                message,
            });
        }

        self.record(op, true, latency_ms, None);
        envelope.data.ok_or_else(|| ClientError::Protocol {
            code: 0,
            message: "missing data field".into(),
        })
    }

    /// Health-pings the remote; idempotent. Used both at startup and by the
    /// reconnect probe after a disconnect.
    pub async fn init(&self) -> Result<()> {
        let url = format!("{}/api/wechat/initialize", self.base_url);
        let _: serde_json::Value = self
            .call_json("init", self.http.post(url).json(&json!({})))
            .await?;
        Ok(())
    }

    pub async fn status(&self) -> Result<serde_json::Value> {
        let url = format!("{}/api/wechat/status", self.base_url);
        self.call_json("status", self.http.get(url)).await
    }

    pub async fn list_unread_main_window(&self) -> Result<Vec<MainWindowChat>> {
        let url = format!("{}/api/message/main-unread", self.base_url);
        self.call_json("list_unread_main_window", self.http.get(url)).await
    }

    pub async fn add_listener(&self, chat_name: &str, opts: &AddListenerOptions) -> Result<()> {
        let url = format!("{}/api/message/listener/add", self.base_url);
        let mut body = serde_json::to_value(opts).unwrap_or_else(|_| json!({}));
        body["chat_name"] = json!(chat_name);
        let _: serde_json::Value = self
            .call_json("add_listener", self.http.post(url).json(&body))
            .await?;
        Ok(())
    }

    pub async fn remove_listener(&self, chat_name: &str) -> Result<()> {
        let url = format!("{}/api/message/listener/remove", self.base_url);
        let _: serde_json::Value = self
            .call_json(
                "remove_listener",
                self.http.post(url).json(&json!({ "chat_name": chat_name })),
            )
            .await?;
        Ok(())
    }

    pub async fn fetch_listener_messages(&self, chat_name: &str) -> Result<Vec<RemoteMessage>> {
        let url = format!("{}/api/message/listener", self.base_url);
        self.call_json(
            "fetch_listener_messages",
            self.http.get(url).query(&[("chat_name", chat_name)]),
        )
        .await
    }

    pub async fn send_text(&self, chat_name: &str, text: &str, at_list: Option<&[String]>) -> Result<()> {
        let url = format!("{}/api/message/send-text", self.base_url);
        let mut body = json!({ "chat_name": chat_name, "text": text });
        if let Some(at_list) = at_list {
            body["at_list"] = json!(at_list);
        }
        let _: serde_json::Value = self
            .call_json("send_text", self.http.post(url).json(&body))
            .await?;
        Ok(())
    }

    /// Signals the remote client's typing indicator for a chat, used ahead
    /// of a reply sent in `typing` mode. Best-effort from the caller's point
    /// of view: a failure here doesn't block the following `send_text`.
    pub async fn send_typing(&self, chat_name: &str) -> Result<()> {
        let url = format!("{}/api/message/typing", self.base_url);
        let _: serde_json::Value = self
            .call_json(
                "send_typing",
                self.http.post(url).json(&json!({ "chat_name": chat_name })),
            )
            .await?;
        Ok(())
    }

    pub async fn send_file(&self, chat_name: &str, path: &str) -> Result<()> {
        let url = format!("{}/api/message/send-file", self.base_url);
        let _: serde_json::Value = self
            .call_json(
                "send_file",
                self.http
                    .post(url)
                    .json(&json!({ "chat_name": chat_name, "path": path })),
            )
            .await?;
        Ok(())
    }

    /// Probe the remote with exponential backoff bounded at
    /// `RECONNECT_BACKOFF_CAP_SECS`, used by the supervisor once a client is
    /// marked disconnected. Returns once `init()` succeeds; never gives up.
    pub async fn reconnect_with_backoff(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut delay = Duration::from_secs(2);
        loop {
            if *shutdown.borrow() || self.is_suspended() {
                return;
            }
            match self.init().await {
                Ok(()) => {
                    info!(base_url = %self.base_url, "remote client reconnected");
                    return;
                }
                Err(e) => {
                    warn!(base_url = %self.base_url, error = %e, retry_after = ?delay, "reconnect probe failed");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                return;
                            }
                        }
                    }
                    delay = (delay * 2).min(Duration::from_secs(RECONNECT_BACKOFF_CAP_SECS));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_client_is_not_disconnected() {
        let client = RemoteClient::new("http://localhost:9000", "key");
        assert!(!client.is_disconnected());
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[test]
    fn three_failures_trip_disconnected() {
        let client = RemoteClient::new("http://localhost:9000", "key");
        client.record("status", false, 10, Some("boom".into()));
        client.record("status", false, 10, Some("boom".into()));
        assert!(!client.is_disconnected());
        client.record("status", false, 10, Some("boom".into()));
        assert!(client.is_disconnected());
    }

    #[test]
    fn success_resets_failure_counter() {
        let client = RemoteClient::new("http://localhost:9000", "key");
        client.record("status", false, 10, Some("boom".into()));
        client.record("status", false, 10, Some("boom".into()));
        client.record("status", true, 10, None);
        assert!(!client.is_disconnected());
        assert_eq!(client.state(), ConnectionState::Connected);
    }

    #[test]
    fn suspend_marks_disconnected_and_resume_clears_it() {
        let client = RemoteClient::new("http://localhost:9000", "key");
        client.suspend();
        assert!(client.is_suspended());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        client.resume();
        assert!(!client.is_suspended());
        assert_eq!(client.state(), ConnectionState::Connecting);
    }
}
