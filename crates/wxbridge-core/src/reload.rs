use crate::types::{InstanceId, PlatformId, RuleId};
use tokio::sync::broadcast;

const BROADCAST_CAPACITY: usize = 256;

/// Typed notification that persisted configuration changed. Delivery is
/// in-process, best-effort, at-least-once; subscribers must be idempotent
/// under duplicate events and must treat a missed (lagged) event as a
/// signal to rehydrate their whole cache rather than patch around the gap.
#[derive(Debug, Clone)]
pub enum ReloadEvent {
    PlatformAdded { id: PlatformId, seq: u64 },
    PlatformUpdated { id: PlatformId, seq: u64 },
    PlatformRemoved { id: PlatformId, seq: u64 },
    RuleAdded { id: RuleId, seq: u64 },
    RuleUpdated { id: RuleId, seq: u64 },
    RuleRemoved { id: RuleId, seq: u64 },
    InstanceAdded { id: InstanceId, seq: u64 },
    InstanceUpdated { id: InstanceId, seq: u64 },
    InstanceRemoved { id: InstanceId, seq: u64 },
    InstanceEnabled { id: InstanceId, seq: u64 },
    InstanceDisabled { id: InstanceId, seq: u64 },
    FixedListenerChanged { seq: u64 },
}

/// Fan-out bus for `ReloadEvent`s to every subscribed component.
///
/// Mirrors the gateway's WS event broadcaster: a `tokio::sync::broadcast`
/// channel with a bounded backlog. Here the payload is the typed event
/// itself rather than a serialized string, since every subscriber lives
/// in-process and a parse step would just be overhead.
pub struct EventBus {
    tx: broadcast::Sender<ReloadEvent>,
    seq: std::sync::atomic::AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }

    /// Publish an event, stamping it with the bus's next sequence number.
    /// Silently drops if there are no subscribers.
    pub fn publish(&self, make: impl FnOnce(u64) -> ReloadEvent) {
        let event = make(self.next_seq());
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(|seq| ReloadEvent::RuleAdded {
            id: RuleId::from("r-1"),
            seq,
        });
        let event = rx.try_recv().expect("event should be queued");
        match event {
            ReloadEvent::RuleAdded { id, seq } => {
                assert_eq!(id.as_str(), "r-1");
                assert_eq!(seq, 0);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(|seq| ReloadEvent::FixedListenerChanged { seq });
    }
}
