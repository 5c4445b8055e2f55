use crate::errors::RecentErrors;
use crate::health::{health_score, HealthInputs};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::info;
use wxbridge_client::{ConnectionState, RemoteClient};
use wxbridge_core::{CounterSnapshot, InstanceId, PipelineCounters};
use wxbridge_store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub health_score: u8,
    pub connected_instances: usize,
    pub total_instances: usize,
    pub active_listeners: u32,
    pub processed: u64,
    pub delivered: u64,
    pub replied: u64,
    pub failed: u64,
    pub recent_errors: Vec<String>,
}

/// Samples process-wide health on a fixed interval. Never mutates core
/// state; every field it reads is a lock-free counter or a short-lived
/// store query issued off the hot path.
pub struct ServiceMonitor {
    store: Arc<Store>,
    clients: HashMap<InstanceId, Arc<RemoteClient>>,
    counters: Arc<PipelineCounters>,
    recent_errors: RecentErrors,
    max_listeners_per_instance: u32,
    snapshot: RwLock<MonitorSnapshot>,
    running: AtomicBool,
}

impl ServiceMonitor {
    pub fn new(store: Arc<Store>, clients: HashMap<InstanceId, Arc<RemoteClient>>, counters: Arc<PipelineCounters>, max_listeners_per_instance: u32) -> Self {
        Self {
            store,
            clients,
            counters,
            recent_errors: RecentErrors::new(),
            max_listeners_per_instance,
            snapshot: RwLock::new(MonitorSnapshot {
                health_score: 0,
                connected_instances: 0,
                total_instances: 0,
                active_listeners: 0,
                processed: 0,
                delivered: 0,
                replied: 0,
                failed: 0,
                recent_errors: Vec::new(),
            }),
            running: AtomicBool::new(true),
        }
    }

    pub fn record_error(&self, message: impl Into<String>) {
        self.recent_errors.push(message);
    }

    pub async fn snapshot(&self) -> MonitorSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!("service monitor started");
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sample().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        self.running.store(false, Ordering::Relaxed);
                        self.sample().await;
                        info!("service monitor shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn sample(&self) {
        let total_instances = self.clients.len();
        let connected_instances = self
            .clients
            .values()
            .filter(|c| matches!(c.state(), ConnectionState::Connected))
            .count();

        let mut active_listeners = 0u32;
        let mut capacity = 0u32;
        for instance_id in self.clients.keys() {
            if let Ok(count) = self.store.count_active_listeners(instance_id) {
                active_listeners += count;
                capacity += self.max_listeners_per_instance;
            }
        }

        let counters: CounterSnapshot = self.counters.snapshot();
        let running = self.running.load(Ordering::Relaxed);

        let inputs = HealthInputs {
            running,
            connected_fraction: if total_instances == 0 {
                1.0
            } else {
                connected_instances as f64 / total_instances as f64
            },
            active_listener_fraction: if capacity == 0 {
                1.0
            } else {
                active_listeners as f64 / capacity as f64
            },
            error_rate: counters.error_rate(),
        };

        let new_snapshot = MonitorSnapshot {
            health_score: health_score(inputs),
            connected_instances,
            total_instances,
            active_listeners,
            processed: counters.processed,
            delivered: counters.delivered,
            replied: counters.replied,
            failed: counters.failed,
            recent_errors: self.recent_errors.snapshot(),
        };

        *self.snapshot.write().await = new_snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_starts_at_zero_before_first_sample() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let monitor = ServiceMonitor::new(store, HashMap::new(), Arc::new(PipelineCounters::new()), 30);
        let snapshot = monitor.snapshot().await;
        assert_eq!(snapshot.health_score, 0);
    }

    #[tokio::test]
    async fn sample_with_no_instances_is_fully_healthy() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let monitor = ServiceMonitor::new(store, HashMap::new(), Arc::new(PipelineCounters::new()), 30);
        monitor.sample().await;
        let snapshot = monitor.snapshot().await;
        assert_eq!(snapshot.health_score, 100);
    }
}
