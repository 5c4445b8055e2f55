use crate::ingest::ingest_batch;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use wxbridge_client::{AddListenerOptions, RemoteClient};
use wxbridge_core::InstanceId;
use wxbridge_store::Store;

/// Tunables for one instance's supervisor loops.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub poll_interval: Duration,
    pub reap_interval: Duration,
    pub inactivity_secs: i64,
    pub max_listeners_per_instance: u32,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            reap_interval: Duration::from_secs(30),
            inactivity_secs: 30 * 60,
            max_listeners_per_instance: 30,
        }
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Runs the cooperating loops for one enabled instance: main-window scan,
/// per-listener scan, inactivity reaper, and disconnect/reconnect probe.
/// Each loop exits only after completing its in-flight iteration once told
/// to shut down.
pub struct InstanceSupervisor {
    instance_id: InstanceId,
    client: Arc<RemoteClient>,
    store: Arc<Store>,
    settings: SupervisorSettings,
}

impl InstanceSupervisor {
    pub fn new(
        instance_id: InstanceId,
        client: Arc<RemoteClient>,
        store: Arc<Store>,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            instance_id,
            client,
            store,
            settings,
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    /// Spawns the main-window, per-listener, reaper, and reconnect loops,
    /// returning their join handles so the caller can await clean shutdown.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            tokio::spawn({
                let this = self.clone();
                let shutdown = shutdown.clone();
                async move { this.run_main_window_loop(shutdown).await }
            }),
            tokio::spawn({
                let this = self.clone();
                let shutdown = shutdown.clone();
                async move { this.run_listener_loop(shutdown).await }
            }),
            tokio::spawn({
                let this = self.clone();
                let shutdown = shutdown.clone();
                async move { this.run_reaper_loop(shutdown).await }
            }),
            tokio::spawn({
                let this = self.clone();
                async move { this.run_reconnect_loop(shutdown).await }
            }),
        ]
    }

    /// Watches for the client tripping `is_disconnected` (three consecutive
    /// call failures) and probes until it recovers. The main-window and
    /// listener loops check `is_disconnected` themselves and skip polling
    /// while this is in flight, so one client outage never blocks others.
    async fn run_reconnect_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.settings.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.client.is_disconnected() {
                        warn!(instance = %self.instance_id, "client disconnected, pausing polling and probing");
                        self.client.reconnect_with_backoff(shutdown.clone()).await;
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn run_main_window_loop(&self, mut shutdown: watch::Receiver<bool>) {
        info!(instance = %self.instance_id, "main-window loop started");
        let mut interval = tokio::time::interval(self.settings.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.scan_main_window().await {
                        error!(instance = %self.instance_id, error = %e, "main-window scan error");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(instance = %self.instance_id, "main-window loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn run_listener_loop(&self, mut shutdown: watch::Receiver<bool>) {
        info!(instance = %self.instance_id, "per-listener loop started");
        let mut interval = tokio::time::interval(self.settings.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.scan_listeners().await {
                        error!(instance = %self.instance_id, error = %e, "listener scan error");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(instance = %self.instance_id, "per-listener loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn run_reaper_loop(&self, mut shutdown: watch::Receiver<bool>) {
        info!(instance = %self.instance_id, "reaper loop started");
        let mut interval = tokio::time::interval(self.settings.reap_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.reap_inactive_listeners().await {
                        error!(instance = %self.instance_id, error = %e, "reaper error");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(instance = %self.instance_id, "reaper loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn scan_main_window(&self) -> crate::error::Result<()> {
        if self.client.is_disconnected() || self.client.is_suspended() {
            return Ok(());
        }
        let chats = self.client.list_unread_main_window().await?;
        let now = now_unix();
        for chat in chats {
            let created = self.store.ensure_listener(&self.instance_id, &chat.chat_name, false, false, now)?;
            if created {
                if let Err(e) = self.ensure_capacity_for_new_listener(&chat.chat_name).await {
                    warn!(instance = %self.instance_id, chat = %chat.chat_name, error = %e, "rejecting new listener, capacity exhausted");
                    self.store.delete_listener(&self.instance_id, &chat.chat_name)?;
                    continue;
                }
                if let Err(e) = self.client.add_listener(&chat.chat_name, &AddListenerOptions::default()).await {
                    warn!(instance = %self.instance_id, chat = %chat.chat_name, error = %e, "remote add_listener failed");
                }
            }
            let (_, max_time) = ingest_batch(&self.store, &self.instance_id, &chat.chat_name, &chat.messages)?;
            if let Some(t) = max_time {
                self.store.touch_listener(&self.instance_id, &chat.chat_name, t, now)?;
            }
        }
        Ok(())
    }

    async fn scan_listeners(&self) -> crate::error::Result<()> {
        if self.client.is_disconnected() || self.client.is_suspended() {
            return Ok(());
        }
        let listeners = self.store.list_active_listeners(&self.instance_id)?;
        let now = now_unix();
        for listener in listeners {
            let messages = match self.client.fetch_listener_messages(&listener.chat_name).await {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(instance = %self.instance_id, chat = %listener.chat_name, error = %e, "fetch_listener_messages failed");
                    continue;
                }
            };
            if messages.is_empty() {
                continue;
            }
            let (_, max_time) = ingest_batch(&self.store, &self.instance_id, &listener.chat_name, &messages)?;
            if let Some(t) = max_time {
                self.store.touch_listener(&self.instance_id, &listener.chat_name, t, now)?;
            }
        }
        Ok(())
    }

    async fn reap_inactive_listeners(&self) -> crate::error::Result<()> {
        let now = now_unix();
        let cutoff = now - self.settings.inactivity_secs;
        let reapable = self.store.find_reapable_listeners(&self.instance_id, cutoff)?;
        for listener in reapable {
            if let Err(e) = self.client.remove_listener(&listener.chat_name).await {
                debug!(instance = %self.instance_id, chat = %listener.chat_name, error = %e, "best-effort remote remove_listener failed");
            }
            self.store.mark_listener_inactive(&self.instance_id, &listener.chat_name, now)?;
            info!(instance = %self.instance_id, chat = %listener.chat_name, "listener reaped for inactivity");
        }
        Ok(())
    }

    /// If adding one more listener would exceed the per-instance cap, reap
    /// the least-recently-active non-exempt listener first; if none exists,
    /// the caller rejects the new listener.
    async fn ensure_capacity_for_new_listener(&self, new_chat_name: &str) -> crate::error::Result<()> {
        let count = self.store.count_active_listeners(&self.instance_id)?;
        if count <= self.settings.max_listeners_per_instance {
            return Ok(());
        }
        match self.store.find_oldest_reclaimable_listener(&self.instance_id)? {
            Some(oldest) if oldest.chat_name != new_chat_name => {
                let now = now_unix();
                if let Err(e) = self.client.remove_listener(&oldest.chat_name).await {
                    debug!(instance = %self.instance_id, chat = %oldest.chat_name, error = %e, "best-effort reclaim remove_listener failed");
                }
                self.store.mark_listener_inactive(&self.instance_id, &oldest.chat_name, now)?;
                Ok(())
            }
            _ => Err(crate::error::SupervisorError::Client(
                wxbridge_client::ClientError::Protocol {
                    code: -1,
                    message: "no reclaimable capacity".into(),
                },
            )),
        }
    }

    /// Ensure every enabled fixed-listener entry exists for this instance.
    /// Run at startup and on `FixedListenerChanged` reload events.
    pub async fn apply_fixed_listeners(&self, session_names: &[String]) -> crate::error::Result<()> {
        let now = now_unix();
        for session_name in session_names {
            let created = self.store.ensure_listener(&self.instance_id, session_name, false, true, now)?;
            if created {
                if let Err(e) = self
                    .client
                    .add_listener(session_name, &AddListenerOptions::default())
                    .await
                {
                    warn!(instance = %self.instance_id, chat = %session_name, error = %e, "remote add_listener failed for fixed listener");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_spec_defaults() {
        let settings = SupervisorSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.inactivity_secs, 1800);
        assert_eq!(settings.max_listeners_per_instance, 30);
    }
}
