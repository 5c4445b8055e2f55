use std::collections::VecDeque;
use std::sync::Mutex;

const DEFAULT_CAPACITY: usize = 100;

/// Bounded ring of recent error strings across the pipeline, for the
/// monitor's snapshot; oldest entries fall off once full.
pub struct RecentErrors {
    ring: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl RecentErrors {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, message: impl Into<String>) {
        let mut ring = self.ring.lock().unwrap();
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(message.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.ring.lock().unwrap().iter().cloned().collect()
    }
}

impl Default for RecentErrors {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_entries_drop_once_full() {
        let ring = RecentErrors::with_capacity(2);
        ring.push("a");
        ring.push("b");
        ring.push("c");
        assert_eq!(ring.snapshot(), vec!["b".to_string(), "c".to_string()]);
    }
}
