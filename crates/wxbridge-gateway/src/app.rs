use axum::{routing::get, Router};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};
use wxbridge_client::RemoteClient;
use wxbridge_core::{BridgeConfig, EventBus, InstanceId, PipelineCounters, PlatformId};
use wxbridge_delivery::{DeliveryConfig, DeliveryPipeline};
use wxbridge_monitor::ServiceMonitor;
use wxbridge_platform::PlatformRegistry;
use wxbridge_rules::RuleEngine;
use wxbridge_store::Store;
use wxbridge_supervisor::{InstanceSupervisor, SupervisorSettings};

/// Central shared state for the bridge process, wired up once at startup
/// and handed to every loop and HTTP handler as an `Arc<AppState>`.
pub struct AppState {
    pub store: Arc<Store>,
    pub clients: HashMap<InstanceId, Arc<RemoteClient>>,
    pub rule_engine: Arc<RwLock<RuleEngine>>,
    pub events: EventBus,
    pub counters: Arc<PipelineCounters>,
    pub monitor: Arc<ServiceMonitor>,
    pub delivery: Arc<DeliveryPipeline>,
    pub supervisors: Vec<Arc<InstanceSupervisor>>,
}

impl AppState {
    pub async fn build(config: &BridgeConfig, store: Arc<Store>) -> anyhow::Result<Self> {
        let instances = store.list_enabled_instances()?;
        let mut clients = HashMap::new();
        for instance in &instances {
            let client = Arc::new(RemoteClient::new(instance.base_url.clone(), instance.api_key.clone()));
            if let Err(e) = client.init().await {
                warn!(instance = %instance.instance_id, error = %e, "initial handshake with remote instance failed, will retry via reconnect probe");
            }
            clients.insert(instance.instance_id.clone(), client);
        }

        let rules = store.list_enabled_rules()?;
        let enabled_platforms: HashSet<PlatformId> = store
            .list_enabled_platforms()?
            .into_iter()
            .map(|p| p.platform_id)
            .collect();
        let rule_engine = Arc::new(RwLock::new(RuleEngine::rebuild(rules, &enabled_platforms)));

        let events = EventBus::new();
        let counters = Arc::new(PipelineCounters::new());
        let platform_registry = Arc::new(PlatformRegistry::new(store.clone()));

        let pipeline = &config.pipeline;
        let delivery_config = DeliveryConfig {
            poll_interval: std::time::Duration::from_secs(pipeline.poll_interval_secs),
            batch_size: pipeline.batch_size,
            merge_messages: pipeline.merge_messages,
            merge_window_secs: pipeline.merge_window_secs as i64,
            concurrency: pipeline.concurrency as usize,
            max_retries: pipeline.max_retries,
            serializer_queue_depth: pipeline.serializer_queue_depth,
            platform_call_timeout: std::time::Duration::from_secs(pipeline.platform_call_timeout_secs),
        };
        let delivery = Arc::new(DeliveryPipeline::new(
            store.clone(),
            clients.clone(),
            rule_engine.clone(),
            platform_registry,
            delivery_config,
            counters.clone(),
        ));

        let monitor = Arc::new(ServiceMonitor::new(
            store.clone(),
            clients.clone(),
            counters.clone(),
            pipeline.max_listeners_per_instance,
        ));

        let supervisor_settings = SupervisorSettings {
            poll_interval: std::time::Duration::from_secs(pipeline.poll_interval_secs),
            reap_interval: std::time::Duration::from_secs(pipeline.poll_interval_secs * 6),
            inactivity_secs: (pipeline.inactivity_minutes * 60) as i64,
            max_listeners_per_instance: pipeline.max_listeners_per_instance,
        };
        let mut supervisors = Vec::with_capacity(instances.len());
        for instance in &instances {
            if let Some(client) = clients.get(&instance.instance_id) {
                supervisors.push(Arc::new(InstanceSupervisor::new(
                    instance.instance_id.clone(),
                    client.clone(),
                    store.clone(),
                    supervisor_settings.clone(),
                )));
            }
        }

        info!(instance_count = instances.len(), "bridge state assembled");

        Ok(Self {
            store,
            clients,
            rule_engine,
            events,
            counters,
            monitor,
            delivery,
            supervisors,
        })
    }

    /// Ensures every enabled instance has its configured fixed listeners
    /// before the supervisor loops start polling.
    pub async fn apply_fixed_listeners_at_startup(&self) -> anyhow::Result<()> {
        let fixed = self.store.list_enabled_fixed_listeners()?;
        let names: Vec<String> = fixed.into_iter().map(|f| f.session_name).collect();
        for supervisor in &self.supervisors {
            supervisor.apply_fixed_listeners(&names).await?;
        }
        Ok(())
    }

    /// Spawns every supervisor, the delivery pipeline, the monitor, and the
    /// reload listener; returns their join handles so the caller can await
    /// clean shutdown.
    pub fn spawn_all(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();
        for supervisor in &self.supervisors {
            handles.extend(supervisor.clone().spawn(shutdown.clone()));
        }

        handles.push(tokio::spawn(crate::reload::run(
            self.clone(),
            self.events.subscribe(),
            shutdown.clone(),
        )));

        let delivery = self.delivery.clone();
        let delivery_shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            delivery.run(delivery_shutdown).await;
        }));

        let monitor = self.monitor.clone();
        let monitor_interval = std::time::Duration::from_secs(30);
        let monitor_shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            monitor.run(monitor_interval, monitor_shutdown).await;
        }));

        handles
    }
}

/// The process exposes only a liveness/status surface, never a CRUD API:
/// instance, rule, and platform configuration is managed directly through
/// the store (or an operator tool built on `wxbridge-store`), not HTTP.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health_handler))
        .route("/status", get(crate::http::status_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
