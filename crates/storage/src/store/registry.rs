#![forbid(unsafe_code)]

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use tokio::sync::Notify;

static GLOBAL: LazyLock<Arc<ChangeRegistry>> = LazyLock::new(|| Arc::new(ChangeRegistry::new()));

/// Continuous-change subscribers keyed by store name.
///
/// Every handle opened under the same name shares one entry, so a commit made
/// through any of them wakes all live feeds for that name.
#[derive(Debug, Default)]
pub struct ChangeRegistry {
    subscribers: DashMap<String, HashMap<u64, Arc<Notify>>>,
    next_id: AtomicU64,
}

#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub notify: Arc<Notify>,
}

impl ChangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    pub fn subscribe(&self, name: &str) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let notify = Arc::new(Notify::new());
        self.subscribers
            .entry(name.to_string())
            .or_default()
            .insert(id, Arc::clone(&notify));
        Subscription { id, notify }
    }

    pub fn unsubscribe(&self, name: &str, id: u64) {
        let now_empty = match self.subscribers.get_mut(name) {
            Some(mut entry) => {
                entry.remove(&id);
                entry.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.subscribers.remove_if(name, |_, set| set.is_empty());
        }
    }

    /// Wakes every subscriber of `name`; a wake with no waiter is kept as a permit.
    pub fn notify(&self, name: &str) {
        if let Some(entry) = self.subscribers.get(name) {
            for notify in entry.values() {
                notify.notify_one();
            }
        }
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.subscribers
            .get(name)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }
}
