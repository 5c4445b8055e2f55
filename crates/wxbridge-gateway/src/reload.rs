use crate::app::AppState;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use wxbridge_core::{PlatformId, ReloadEvent};
use wxbridge_rules::RuleEngine;

/// Drains the reload bus and refreshes the in-memory rule/platform caches.
/// A lagged receiver (missed events) triggers a full rehydration of both
/// caches rather than trying to patch around the gap.
pub async fn run(state: Arc<AppState>, mut rx: broadcast::Receiver<ReloadEvent>, mut shutdown: watch::Receiver<bool>) {
    info!("reload listener started");
    loop {
        tokio::select! {
            received = rx.recv() => {
                match received {
                    Ok(event) => handle_event(&state, event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "reload listener lagged, rehydrating full caches");
                        rehydrate_rules(&state).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("reload bus closed, reload listener exiting");
                        break;
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("reload listener shutting down");
                    break;
                }
            }
        }
    }
}

async fn handle_event(state: &Arc<AppState>, event: ReloadEvent) {
    match event {
        ReloadEvent::RuleAdded { .. } | ReloadEvent::RuleUpdated { .. } | ReloadEvent::RuleRemoved { .. } => {
            rehydrate_rules(state).await;
        }
        ReloadEvent::PlatformUpdated { id, .. } | ReloadEvent::PlatformRemoved { id, .. } => {
            state.delivery.invalidate_platform(&id);
            rehydrate_rules(state).await;
        }
        ReloadEvent::PlatformAdded { .. } => {
            rehydrate_rules(state).await;
        }
        ReloadEvent::FixedListenerChanged { .. } => {
            for supervisor in &state.supervisors {
                if let Ok(fixed) = state.store.list_enabled_fixed_listeners() {
                    let names: Vec<String> = fixed.into_iter().map(|f| f.session_name).collect();
                    if let Err(e) = supervisor.apply_fixed_listeners(&names).await {
                        warn!(error = %e, "failed to apply fixed listeners after reload");
                    }
                }
            }
        }
        ReloadEvent::InstanceEnabled { id, .. } => {
            if let Some(client) = state.clients.get(&id) {
                client.resume();
                info!(instance = %id, "instance enabled, client resumed");
            }
        }
        ReloadEvent::InstanceDisabled { id, .. } => {
            if let Some(client) = state.clients.get(&id) {
                client.suspend();
                info!(instance = %id, "instance disabled, client and listeners suspended");
            }
        }
        ReloadEvent::InstanceAdded { .. } | ReloadEvent::InstanceUpdated { .. } | ReloadEvent::InstanceRemoved { .. } => {
            warn!("instance topology changed; restart the process to pick up added/removed instances");
        }
    }
}

async fn rehydrate_rules(state: &Arc<AppState>) {
    let rules = match state.store.list_enabled_rules() {
        Ok(rules) => rules,
        Err(e) => {
            warn!(error = %e, "failed to rehydrate rule engine");
            return;
        }
    };
    let enabled_platforms: HashSet<PlatformId> = match state.store.list_enabled_platforms() {
        Ok(platforms) => platforms.into_iter().map(|p| p.platform_id).collect(),
        Err(e) => {
            warn!(error = %e, "failed to load enabled platforms for rule rehydration");
            return;
        }
    };
    *state.rule_engine.write().await = RuleEngine::rebuild(rules, &enabled_platforms);
}
