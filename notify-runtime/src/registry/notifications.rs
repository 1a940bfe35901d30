use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

use notify_core::{Identity, Notification, ResourceKey};

/// Notifications indexed by the [`ResourceKey`] of the resource type they
/// watch. A `Notification`'s `extra_resources` do not gain their own entries
/// here: the Sources Controller consults [`NotificationRegistry::watch_keys`]
/// directly rather than this index, since an extra resource is read on
/// demand and is never itself a trigger for re-evaluating conditions.
#[derive(Default)]
pub struct NotificationRegistry {
    by_watch_key: Mutex<HashMap<ResourceKey, Vec<Arc<Notification>>>>,
    by_identity: Mutex<HashMap<Identity, ResourceKey>>,
}

impl NotificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a `Notification`. If one with the same identity
    /// is already registered under a different watch key, it is removed from
    /// that key first so a notification never lingers under a stale type.
    pub fn upsert(&self, notification: Notification) {
        let identity = notification.identity();
        let new_key = notification.watch_key();

        self.remove(&identity);

        self.by_watch_key
            .lock()
            .entry(new_key.clone())
            .or_default()
            .push(Arc::new(notification));
        self.by_identity.lock().insert(identity, new_key);
    }

    pub fn remove(&self, identity: &Identity) {
        let Some(old_key) = self.by_identity.lock().remove(identity) else {
            return;
        };

        let mut by_watch_key = self.by_watch_key.lock();
        if let Some(list) = by_watch_key.get_mut(&old_key) {
            list.retain(|n| &n.identity() != identity);
            if list.is_empty() {
                by_watch_key.remove(&old_key);
            }
        }
    }

    /// All notifications currently watching `key`, in no particular order.
    pub fn watching(&self, key: &ResourceKey) -> Vec<Arc<Notification>> {
        self.by_watch_key.lock().get(key).cloned().unwrap_or_default()
    }

    /// The set of resource types at least one registered `Notification`
    /// watches. The Watcher Controller reconciles against this list.
    pub fn watch_keys(&self) -> Vec<ResourceKey> {
        self.by_watch_key.lock().keys().cloned().collect()
    }

    /// The union of every registered notification's `extraResources`,
    /// deduplicated and sorted. The Sources Controller reconciles against
    /// this list; `ResourceKey`'s `Ord` impl (byte-exact over the formatted
    /// string) gives a stable, deterministic order for free. A blank
    /// `extraResources` entry (no `resource` set) never reached an informer
    /// anywhere in the original object, so it is filtered rather than handed
    /// to the Sources Controller as a key to subscribe to.
    pub fn extra_keys(&self) -> Vec<ResourceKey> {
        let by_watch_key = self.by_watch_key.lock();
        let mut keys: Vec<ResourceKey> = by_watch_key
            .values()
            .flatten()
            .flat_map(|n| n.extra_keys())
            .filter(|key| !key.resource().is_empty())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_core::{Message, MessageIntegration, NotificationSpec, Synchronization};

    fn notification(namespace: &str, name: &str, resource: &str) -> Notification {
        Notification {
            namespace: namespace.into(),
            name: name.into(),
            spec: NotificationSpec {
                synchronization: Synchronization { time: "5m".into() },
                watch: notify_core::GroupVersionResource {
                    group: "apps".into(),
                    version: "v1".into(),
                    resource: resource.into(),
                    namespace: "".into(),
                    name: "".into(),
                },
                extra_resources: vec![],
                conditions: vec![],
                message: Message {
                    data: "hi".into(),
                    integration: MessageIntegration { name: "hook".into() },
                },
            },
            status: Default::default(),
        }
    }

    #[test]
    fn upsert_then_watching_returns_it() {
        let registry = NotificationRegistry::new();
        registry.upsert(notification("default", "n1", "deployments"));

        let key = ResourceKey::new("apps", "v1", "deployments", "", "");
        assert_eq!(registry.watching(&key).len(), 1);
        assert_eq!(registry.watch_keys(), vec![key]);
    }

    #[test]
    fn upsert_moves_between_watch_keys() {
        let registry = NotificationRegistry::new();
        registry.upsert(notification("default", "n1", "deployments"));
        registry.upsert(notification("default", "n1", "statefulsets"));

        let old_key = ResourceKey::new("apps", "v1", "deployments", "", "");
        let new_key = ResourceKey::new("apps", "v1", "statefulsets", "", "");
        assert!(registry.watching(&old_key).is_empty());
        assert_eq!(registry.watching(&new_key).len(), 1);
    }

    #[test]
    fn extra_keys_is_sorted_and_deduplicated() {
        let registry = NotificationRegistry::new();
        let mut with_extra = notification("default", "n1", "deployments");
        with_extra.spec.extra_resources = vec![
            notify_core::GroupVersionResource {
                group: "".into(),
                version: "v1".into(),
                resource: "secrets".into(),
                namespace: "".into(),
                name: "".into(),
            },
            notify_core::GroupVersionResource {
                group: "".into(),
                version: "v1".into(),
                resource: "configmaps".into(),
                namespace: "".into(),
                name: "".into(),
            },
        ];
        let mut other = notification("default", "n2", "statefulsets");
        other.spec.extra_resources = vec![notify_core::GroupVersionResource {
            group: "".into(),
            version: "v1".into(),
            resource: "configmaps".into(),
            namespace: "".into(),
            name: "".into(),
        }];

        registry.upsert(with_extra);
        registry.upsert(other);

        let keys = registry.extra_keys();
        assert_eq!(
            keys,
            vec![
                ResourceKey::new("", "v1", "configmaps", "", ""),
                ResourceKey::new("", "v1", "secrets", "", ""),
            ]
        );
    }

    #[test]
    fn extra_keys_filters_blank_entries() {
        let registry = NotificationRegistry::new();
        let mut with_blank = notification("default", "n1", "deployments");
        with_blank.spec.extra_resources = vec![
            notify_core::GroupVersionResource {
                group: "".into(),
                version: "v1".into(),
                resource: "configmaps".into(),
                namespace: "".into(),
                name: "".into(),
            },
            notify_core::GroupVersionResource::default(),
        ];

        registry.upsert(with_blank);

        assert_eq!(registry.extra_keys(), vec![ResourceKey::new("", "v1", "configmaps", "", "")]);
    }

    #[test]
    fn remove_drops_the_empty_watch_key_bucket() {
        let registry = NotificationRegistry::new();
        registry.upsert(notification("default", "n1", "deployments"));
        registry.remove(&(Some("default".into()), "n1".into()));

        assert!(registry.watch_keys().is_empty());
    }
}
