use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use notify_core::ResourceKey;

use crate::error::DisableError;

/// How many times `disable` polls `started` before giving up, and how far
/// apart the polls are, per `SPEC_FULL.md` §4.3.
const DISABLE_POLL_ATTEMPTS: u32 = 10;
const DISABLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Identity of a pooled snapshot: `(namespace, name)`, read off `metadata`.
fn item_identity(item: &Value) -> (Option<String>, String) {
    let namespace = item
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let name = item
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    (namespace, name)
}

/// Per-key state tracked by the [`SourceRegistry`]: the same
/// started/stop-signal shape as a [`crate::registry::WatcherHandle`], plus
/// the pool of latest-observed snapshots for that key.
struct SourceHandle {
    started: bool,
    stop: Option<oneshot::Sender<()>>,
    items: Vec<Arc<Value>>,
}

/// Mirrors [`crate::registry::WatcherRegistry`]'s lifecycle bookkeeping, but
/// additionally owns a deduplicated pool of the latest snapshot observed for
/// each `(namespace, name)` under a `ResourceKey`: the auxiliary context the
/// Event Processor attaches to a template's `sources.*` field.
#[derive(Default)]
pub struct SourceRegistry {
    sources: Mutex<HashMap<ResourceKey, SourceHandle>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent-by-replacement, like [`crate::registry::WatcherRegistry::register`],
    /// but preserves the existing item pool across re-registration. A
    /// restarted informer task should not lose previously observed snapshots.
    pub fn register(&self, key: ResourceKey) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let mut sources = self.sources.lock();
        let items = sources.remove(&key).map(|h| h.items).unwrap_or_default();
        sources.insert(
            key,
            SourceHandle {
                started: false,
                stop: Some(tx),
                items,
            },
        );
        rx
    }

    pub fn set_started(&self, key: &ResourceKey, started: bool) {
        if let Some(handle) = self.sources.lock().get_mut(key) {
            handle.started = started;
        }
    }

    pub fn is_started(&self, key: &ResourceKey) -> bool {
        self.sources.lock().get(key).is_some_and(|h| h.started)
    }

    pub fn is_registered(&self, key: &ResourceKey) -> bool {
        self.sources.lock().contains_key(key)
    }

    /// Signal the source task for `key` to stop, then poll `started` up to
    /// `DISABLE_POLL_ATTEMPTS` times, `DISABLE_POLL_INTERVAL` apart. Deletes
    /// the entry and returns as soon as the task confirms it has stopped; if
    /// it is still running once the poll budget is spent, leaves the entry
    /// (and its item pool) in place and returns `Err(DisableError)` so the
    /// caller can retry on its next sweep.
    pub async fn disable(&self, key: &ResourceKey) -> Result<(), DisableError> {
        {
            let mut sources = self.sources.lock();
            let Some(handle) = sources.get_mut(key) else {
                return Ok(());
            };
            if let Some(stop) = handle.stop.take() {
                let _ = stop.send(());
            }
        }

        for _ in 0..DISABLE_POLL_ATTEMPTS {
            if !self.is_started(key) {
                self.sources.lock().remove(key);
                return Ok(());
            }
            tokio::time::sleep(DISABLE_POLL_INTERVAL).await;
        }

        Err(DisableError(key.clone()))
    }

    pub fn registered_keys(&self) -> Vec<ResourceKey> {
        self.sources.lock().keys().cloned().collect()
    }

    /// Insert or replace `item` in `key`'s pool, deduplicated by
    /// `(namespace, name)`. Used for both `Added` and `Modified` snapshots.
    pub fn put_item(&self, key: &ResourceKey, item: Value) {
        let identity = item_identity(&item);
        let mut sources = self.sources.lock();
        let Some(handle) = sources.get_mut(key) else {
            return;
        };
        handle.items.retain(|existing| item_identity(existing) != identity);
        handle.items.push(Arc::new(item));
    }

    /// Remove the pooled snapshot matching `item`'s identity, for a `Deleted`
    /// event.
    pub fn remove_item(&self, key: &ResourceKey, item: &Value) {
        let identity = item_identity(item);
        let mut sources = self.sources.lock();
        let Some(handle) = sources.get_mut(key) else {
            return;
        };
        handle.items.retain(|existing| item_identity(existing) != identity);
    }

    /// The current snapshot pool for `key`, empty if the key is unknown.
    pub fn items(&self, key: &ResourceKey) -> Vec<Arc<Value>> {
        self.sources.lock().get(key).map(|h| h.items.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> ResourceKey {
        ResourceKey::new("", "v1", "configmaps", "", "")
    }

    #[test]
    fn put_item_dedupes_by_identity() {
        let registry = SourceRegistry::new();
        registry.register(key());
        registry.put_item(&key(), json!({"metadata": {"name": "cm1"}, "data": {"v": "1"}}));
        registry.put_item(&key(), json!({"metadata": {"name": "cm1"}, "data": {"v": "2"}}));

        let items = registry.items(&key());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["data"]["v"], "2");
    }

    #[test]
    fn remove_item_drops_matching_identity() {
        let registry = SourceRegistry::new();
        registry.register(key());
        registry.put_item(&key(), json!({"metadata": {"name": "cm1"}}));
        registry.remove_item(&key(), &json!({"metadata": {"name": "cm1"}}));

        assert!(registry.items(&key()).is_empty());
    }

    #[test]
    fn distinct_identities_coexist() {
        let registry = SourceRegistry::new();
        registry.register(key());
        registry.put_item(&key(), json!({"metadata": {"name": "cm1"}}));
        registry.put_item(&key(), json!({"metadata": {"name": "cm2"}}));

        assert_eq!(registry.items(&key()).len(), 2);
    }

    #[tokio::test]
    async fn disable_removes_from_registered_keys_once_started_drops() {
        let registry = SourceRegistry::new();
        registry.register(key());

        assert!(registry.disable(&key()).await.is_ok());
        assert!(registry.registered_keys().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn disable_leaves_the_entry_when_the_task_never_stops() {
        let registry = SourceRegistry::new();
        registry.register(key());
        registry.set_started(&key(), true);

        let err = registry.disable(&key()).await.unwrap_err();
        assert_eq!(err.0, key());
        assert!(registry.is_registered(&key()), "entry stays so the cleaner loop can retry");
    }
}
