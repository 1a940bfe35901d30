use hashbrown::HashMap;
use parking_lot::Mutex;

use notify_core::Integration;

/// Integrations indexed by name. Unlike `Notification`, `Integration` is
/// cluster-scoped, so name alone is the identity.
#[derive(Default)]
pub struct IntegrationRegistry {
    by_name: Mutex<HashMap<String, Integration>>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, integration: Integration) {
        self.by_name.lock().insert(integration.name.clone(), integration);
    }

    pub fn remove(&self, name: &str) {
        self.by_name.lock().remove(name);
    }

    pub fn get(&self, name: &str) -> Option<Integration> {
        self.by_name.lock().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.by_name.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_core::IntegrationSpec;

    fn integration(name: &str) -> Integration {
        Integration {
            name: name.into(),
            spec: IntegrationSpec {
                type_: "webhook".into(),
                ..Default::default()
            },
            status: Default::default(),
        }
    }

    #[test]
    fn upsert_then_get_roundtrips() {
        let registry = IntegrationRegistry::new();
        registry.upsert(integration("hook"));
        assert!(registry.get("hook").is_some());
        assert_eq!(registry.names(), vec!["hook".to_string()]);
    }

    #[test]
    fn remove_drops_it() {
        let registry = IntegrationRegistry::new();
        registry.upsert(integration("hook"));
        registry.remove("hook");
        assert!(registry.get("hook").is_none());
    }
}
