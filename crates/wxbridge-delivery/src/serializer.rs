use crate::error::{DeliveryError, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-chat lock plus a count of tasks currently waiting on it, so a chat
/// that falls behind rejects new work instead of building an unbounded
/// backlog of queued deliveries.
struct ChatLock {
    mutex: Arc<Mutex<()>>,
    waiting: AtomicUsize,
}

/// Serializes delivery attempts within one chat (so replies never race each
/// other out of order) while bounding how many callers may queue behind a
/// single slow chat.
pub struct ChatSerializer {
    locks: DashMap<String, Arc<ChatLock>>,
    queue_depth_limit: usize,
}

pub struct ChatGuard {
    _permit: OwnedMutexGuard<()>,
    lock: Arc<ChatLock>,
}

impl Drop for ChatGuard {
    fn drop(&mut self) {
        self.lock.waiting.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ChatSerializer {
    pub fn new(queue_depth_limit: usize) -> Self {
        Self {
            locks: DashMap::new(),
            queue_depth_limit,
        }
    }

    /// Acquire exclusive access to `chat_key`. Fails with `Overload` rather
    /// than blocking if the queue depth limit is already reached.
    pub async fn acquire(&self, chat_key: &str) -> Result<ChatGuard> {
        let lock = self
            .locks
            .entry(chat_key.to_string())
            .or_insert_with(|| {
                Arc::new(ChatLock {
                    mutex: Arc::new(Mutex::new(())),
                    waiting: AtomicUsize::new(0),
                })
            })
            .clone();

        let depth = lock.waiting.fetch_add(1, Ordering::AcqRel) + 1;
        if depth > self.queue_depth_limit {
            lock.waiting.fetch_sub(1, Ordering::AcqRel);
            return Err(DeliveryError::Overload {
                chat_key: chat_key.to_string(),
                depth,
            });
        }

        let permit = lock.mutex.clone().lock_owned().await;
        Ok(ChatGuard {
            _permit: permit,
            lock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_acquisitions_on_same_chat_succeed() {
        let serializer = ChatSerializer::new(32);
        {
            let _g = serializer.acquire("alice").await.unwrap();
        }
        let _g2 = serializer.acquire("alice").await.unwrap();
    }

    #[tokio::test]
    async fn distinct_chats_do_not_contend() {
        let serializer = ChatSerializer::new(32);
        let _a = serializer.acquire("alice").await.unwrap();
        let _b = serializer.acquire("bob").await.unwrap();
    }

    #[tokio::test]
    async fn overload_is_rejected_past_queue_depth() {
        let serializer = Arc::new(ChatSerializer::new(1));
        let held = serializer.acquire("alice").await.unwrap();
        let err = serializer.acquire("alice").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Overload { .. }));
        drop(held);
    }
}
