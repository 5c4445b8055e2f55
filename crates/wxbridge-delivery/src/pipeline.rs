use crate::error::{DeliveryError, Result};
use crate::merge::{coalesce, MergedUnit};
use crate::retry::backoff_secs;
use crate::serializer::ChatSerializer;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};
use wxbridge_client::RemoteClient;
use wxbridge_core::{InstanceId, PipelineCounters, PlatformId};
use wxbridge_platform::{InboundUnit, Platform, PlatformRegistry};
use wxbridge_rules::RuleEngine;
use wxbridge_store::{Message, ReplyStatus, Store};

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub poll_interval: Duration,
    pub batch_size: u32,
    pub merge_messages: bool,
    pub merge_window_secs: i64,
    pub concurrency: usize,
    pub max_retries: u32,
    pub serializer_queue_depth: usize,
    pub platform_call_timeout: Duration,
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Scans unprocessed messages, matches them against the rule set, dispatches
/// each matched unit to its platform, and writes back delivery/reply
/// outcomes. Mirrors the supervisor's tick-loop shape, with its own
/// per-chat serializer so concurrent chats never block each other.
pub struct DeliveryPipeline {
    store: Arc<Store>,
    clients: HashMap<InstanceId, Arc<RemoteClient>>,
    rule_engine: Arc<RwLock<RuleEngine>>,
    platform_registry: Arc<PlatformRegistry>,
    platform_cache: DashMap<String, Arc<dyn Platform>>,
    serializer: ChatSerializer,
    config: DeliveryConfig,
    counters: Arc<PipelineCounters>,
}

impl DeliveryPipeline {
    pub fn new(
        store: Arc<Store>,
        clients: HashMap<InstanceId, Arc<RemoteClient>>,
        rule_engine: Arc<RwLock<RuleEngine>>,
        platform_registry: Arc<PlatformRegistry>,
        config: DeliveryConfig,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        let serializer = ChatSerializer::new(config.serializer_queue_depth);
        Self {
            store,
            clients,
            rule_engine,
            platform_registry,
            platform_cache: DashMap::new(),
            serializer,
            config,
            counters,
        }
    }

    pub fn counters(&self) -> &Arc<PipelineCounters> {
        &self.counters
    }

    /// Drop a cached platform instance so the next dispatch rebuilds it
    /// from the latest persisted config. Called on platform reload events.
    pub fn invalidate_platform(&self, platform_id: &PlatformId) {
        self.platform_cache.remove(platform_id.as_str());
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("delivery pipeline started");
        let mut interval = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.process_batch().await {
                        error!(error = %e, "delivery batch error");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("delivery pipeline shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn process_batch(&self) -> Result<()> {
        let messages = self.store.fetch_unprocessed(self.config.batch_size)?;
        if messages.is_empty() {
            return Ok(());
        }

        let mut order: Vec<(InstanceId, String)> = Vec::new();
        let mut groups: HashMap<(InstanceId, String), Vec<Message>> = HashMap::new();
        for msg in messages {
            let key = (msg.instance_id.clone(), msg.chat_name.clone());
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(msg);
        }

        let units: Vec<((InstanceId, String), MergedUnit)> = order
            .into_iter()
            .flat_map(|key| {
                let batch = groups.remove(&key).unwrap_or_default();
                coalesce(batch, self.config.merge_messages, self.config.merge_window_secs)
                    .into_iter()
                    .map(move |unit| (key.clone(), unit))
            })
            .collect();

        stream::iter(units)
            .for_each_concurrent(self.config.concurrency, |((instance_id, chat_name), unit)| async move {
                if let Err(e) = self.process_unit(&instance_id, &chat_name, unit).await {
                    match &e {
                        DeliveryError::Overload { chat_key, depth } => {
                            debug!(chat_key, depth, "skipping unit, chat serializer overloaded");
                        }
                        other => error!(error = %other, instance = %instance_id, chat = %chat_name, "delivery unit failed"),
                    }
                }
            })
            .await;

        Ok(())
    }

    async fn process_unit(&self, instance_id: &InstanceId, chat_name: &str, unit: MergedUnit) -> Result<()> {
        let chat_key = format!("{instance_id}/{chat_name}");
        let _guard = self.serializer.acquire(&chat_key).await?;

        let now = now_unix();
        let matched = {
            let engine = self.rule_engine.read().await;
            engine.match_message(instance_id, chat_name, &unit.content).cloned()
        };
        let Some(rule) = matched else {
            self.store.mark_no_rule(&unit.ids, now)?;
            return Ok(());
        };

        let platform = match self.resolve_platform(&rule.platform_id).await {
            Ok(platform) => platform,
            Err(e) => {
                warn!(platform_id = %rule.platform_id, error = %e, "platform resolution failed");
                self.store.mark_delivery_failed(&unit.ids, &e.to_string(), now)?;
                return Ok(());
            }
        };

        let is_group_chat = unit.sample.sender != chat_name;
        let inbound = InboundUnit {
            instance_id: instance_id.to_string(),
            chat_name: chat_name.to_string(),
            sender: unit.sample.sender.clone(),
            sender_remark: unit.sample.sender_remark.clone(),
            content: unit.content.clone(),
            is_group_chat,
            message_type: unit.sample.message_type.as_str().to_string(),
        };

        self.counters.incr_processed();
        let outcome = match tokio::time::timeout(self.config.platform_call_timeout, platform.process(&inbound)).await {
            Ok(result) => result,
            Err(_) => Err(wxbridge_platform::PlatformError::Timeout(
                self.config.platform_call_timeout.as_millis() as u64,
            )),
        };
        match outcome {
            Ok(reply) if !reply.should_reply => {
                self.store.mark_delivered(&unit.ids, &rule.platform_id, None, ReplyStatus::None, now)?;
                self.counters.incr_delivered();
            }
            Ok(reply) => {
                let mut text = reply.content;
                let mut at_list = None;
                if rule.reply_at_sender && is_group_chat {
                    text = format!("@{} {text}", unit.sample.sender);
                    at_list = Some(vec![unit.sample.sender.clone()]);
                }
                let client = self.clients.get(instance_id);
                let send_result = match client {
                    Some(client) => {
                        if reply.send_mode == wxbridge_platform::SendMode::Typing {
                            if let Err(e) = client.send_typing(chat_name).await {
                                warn!(instance = %instance_id, chat = %chat_name, error = %e, "typing indicator send failed");
                            }
                        }
                        client.send_text(chat_name, &text, at_list.as_deref()).await
                    }
                    None => Err(wxbridge_client::ClientError::Protocol {
                        code: -1,
                        message: "no client configured for instance".into(),
                    }),
                };
                let reply_status = if send_result.is_ok() {
                    ReplyStatus::Success
                } else {
                    if let Err(e) = &send_result {
                        warn!(instance = %instance_id, chat = %chat_name, error = %e, "reply send failed");
                    }
                    ReplyStatus::Failed
                };
                self.store
                    .mark_delivered(&unit.ids, &rule.platform_id, Some(&text), reply_status, now)?;
                self.counters.incr_delivered();
                if matches!(reply_status, ReplyStatus::Success) {
                    self.counters.incr_replied();
                }
            }
            Err(e) => {
                if e.is_permanent() {
                    self.store.mark_delivery_failed(&unit.ids, &e.to_string(), now)?;
                    self.counters.incr_failed();
                } else {
                    let retry_count = unit.sample.retry_count + 1;
                    if retry_count >= self.config.max_retries {
                        self.store.mark_retries_exhausted(&unit.ids, &e.to_string(), now)?;
                        self.counters.incr_failed();
                    } else {
                        let next_retry_at = now + backoff_secs(retry_count) as i64;
                        self.store
                            .schedule_retry(&unit.ids, retry_count, next_retry_at, &e.to_string())?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn resolve_platform(&self, platform_id: &PlatformId) -> std::result::Result<Arc<dyn Platform>, wxbridge_platform::PlatformError> {
        if let Some(cached) = self.platform_cache.get(platform_id.as_str()) {
            return Ok(cached.clone());
        }
        let row = self
            .store
            .get_platform(platform_id)
            .map_err(|e| wxbridge_platform::PlatformError::Config(e.to_string()))?;
        if !row.enabled {
            return Err(wxbridge_platform::PlatformError::Config(format!(
                "platform {platform_id} is disabled"
            )));
        }
        let platform = self.platform_registry.build(platform_id, row.kind, &row.config).await?;
        self.platform_cache.insert(platform_id.as_str().to_string(), platform.clone());
        Ok(platform)
    }
}
