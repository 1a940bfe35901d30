//! Notification Reconciler and Integration Reconciler.
//!
//! These are "contract only" collaborators per the spec: the declarative
//! object's finalizer/requeue machinery and the orchestrator client that
//! would fetch a referenced `Secret` live outside this crate. The
//! registry-facing half of each reconciler (re-keying, credential expansion,
//! status conditions) is fully implemented and testable without a live
//! cluster.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use notify_core::{Condition, ConditionStatus, Integration, Notification};

use crate::registry::{IntegrationRegistry, NotificationRegistry};

/// Reconciles `Notification` objects into the [`NotificationRegistry`].
pub struct NotificationReconciler {
    notifications: Arc<NotificationRegistry>,
}

impl NotificationReconciler {
    pub fn new(notifications: Arc<NotificationRegistry>) -> Self {
        Self { notifications }
    }

    /// Validate and upsert `notification`. `upsert` on the registry already
    /// performs the "remove from every key, then add" re-keying idiom, so
    /// this only needs to attach the resulting status condition.
    pub fn reconcile(&self, mut notification: Notification) -> Notification {
        if let Err(err) = notification.spec.synchronization.parse_time() {
            Condition::upsert(
                &mut notification.status.conditions,
                Condition::new(
                    "ResourceSynced",
                    ConditionStatus::False,
                    "Misconfigured",
                    format!("invalid synchronization.time: {err}"),
                ),
            );
            return notification;
        }

        Condition::upsert(
            &mut notification.status.conditions,
            Condition::new("ResourceSynced", ConditionStatus::True, "TargetSynced", "notification registered"),
        );
        self.notifications.upsert(notification.clone());
        notification
    }

    /// Remove `notification`'s identity from the registry (its declarative
    /// object's delete/finalizer-removal path).
    pub fn remove(&self, identity: &notify_core::Identity) {
        self.notifications.remove(identity);
    }
}

/// Reconciles `Integration` objects into the [`IntegrationRegistry`],
/// expanding `${var}` references against a caller-supplied secret data map.
pub struct IntegrationReconciler {
    integrations: Arc<IntegrationRegistry>,
}

impl IntegrationReconciler {
    pub fn new(integrations: Arc<IntegrationRegistry>) -> Self {
        Self { integrations }
    }

    /// `secret_data` is the referenced `Secret`'s key/value map, already
    /// fetched by the caller (the orchestrator client is an external
    /// collaborator; this crate only performs the substitution).
    pub fn reconcile(&self, mut integration: Integration, secret_data: Option<&HashMap<String, String>>) -> Integration {
        if integration.spec.requests_credentials() && secret_data.is_none() {
            Condition::upsert(
                &mut integration.status.conditions,
                Condition::new(
                    "ResourceSynced",
                    ConditionStatus::False,
                    "Misconfigured",
                    "credentials.secretRef is set but no secret data was resolved",
                ),
            );
            self.integrations.upsert(integration.clone());
            return integration;
        }

        if let Some(data) = secret_data {
            integration = expand_credentials(integration, data);
        }

        Condition::upsert(
            &mut integration.status.conditions,
            Condition::new("ResourceSynced", ConditionStatus::True, "TargetSynced", "integration registered"),
        );
        self.integrations.upsert(integration.clone());
        integration
    }

    pub fn remove(&self, name: &str) {
        self.integrations.remove(name);
    }
}

/// Expand `${varName}` occurrences in every string leaf of `integration`'s
/// manifest against `secret_data`, via a JSON round-trip. The `credentials`
/// field is elided from the walk (restored afterward) so a secret value that
/// itself looks like `${...}` can never recursively substitute.
fn expand_credentials(mut integration: Integration, secret_data: &HashMap<String, String>) -> Integration {
    let credentials = std::mem::take(&mut integration.spec.credentials);

    let Ok(mut value) = serde_json::to_value(&integration) else {
        integration.spec.credentials = credentials;
        return integration;
    };

    substitute_strings(&mut value, secret_data);

    match serde_json::from_value::<Integration>(value) {
        Ok(mut expanded) => {
            expanded.spec.credentials = credentials;
            expanded
        }
        Err(_) => {
            integration.spec.credentials = credentials;
            integration
        }
    }
}

fn substitute_strings(value: &mut Value, vars: &HashMap<String, String>) {
    match value {
        Value::String(s) => *s = substitute(s, vars),
        Value::Array(items) => items.iter_mut().for_each(|v| substitute_strings(v, vars)),
        Value::Object(map) => map.values_mut().for_each(|v| substitute_strings(v, vars)),
        _ => {}
    }
}

/// Replace every `${name}` in `input` with `vars["name"]`; placeholders with
/// no matching entry are left verbatim.
fn substitute(input: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..start]);
        let name = &rest[start + 2..start + end];
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str("${");
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_core::{IntegrationSpec, SecretReference, WebhookSpec};

    fn integration_with_placeholder() -> Integration {
        Integration {
            name: "hook".into(),
            spec: IntegrationSpec {
                type_: "webhook".into(),
                webhook: WebhookSpec {
                    url: "https://example.com/${token}".into(),
                    verb: "POST".into(),
                    headers: [("Authorization".to_string(), "Bearer ${token}".to_string())].into(),
                    validator: None,
                },
                credentials: notify_core::IntegrationCredentials {
                    secret_ref: Some(SecretReference {
                        name: "creds".into(),
                        namespace: "default".into(),
                    }),
                },
            },
            status: Default::default(),
        }
    }

    #[test]
    fn expands_placeholders_in_url_and_headers() {
        let secret: HashMap<String, String> = [("token".to_string(), "abc123".to_string())].into();
        let expanded = expand_credentials(integration_with_placeholder(), &secret);

        assert_eq!(expanded.spec.webhook.url, "https://example.com/abc123");
        assert_eq!(expanded.spec.webhook.headers["Authorization"], "Bearer abc123");
    }

    #[test]
    fn unresolvable_placeholder_is_left_verbatim() {
        let secret: HashMap<String, String> = HashMap::new();
        let expanded = expand_credentials(integration_with_placeholder(), &secret);
        assert_eq!(expanded.spec.webhook.url, "https://example.com/${token}");
    }

    #[test]
    fn manifest_with_no_placeholders_is_identity() {
        let mut integration = integration_with_placeholder();
        integration.spec.webhook.url = "https://example.com/fixed".into();
        integration.spec.webhook.headers.clear();

        let secret: HashMap<String, String> = [("token".to_string(), "abc123".to_string())].into();
        let expanded = expand_credentials(integration.clone(), &secret);
        assert_eq!(expanded.spec.webhook.url, integration.spec.webhook.url);
    }

    #[test]
    fn reconciler_sets_misconfigured_when_secret_unresolved() {
        let registry = Arc::new(IntegrationRegistry::new());
        let reconciler = IntegrationReconciler::new(registry);
        let result = reconciler.reconcile(integration_with_placeholder(), None);

        let condition = result.status.conditions.iter().find(|c| c.type_ == "ResourceSynced").unwrap();
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, "Misconfigured");
    }

    #[test]
    fn notification_reconciler_rejects_bad_duration() {
        let registry = Arc::new(NotificationRegistry::new());
        let reconciler = NotificationReconciler::new(registry);

        let notification = Notification {
            namespace: "default".into(),
            name: "n1".into(),
            spec: notify_core::NotificationSpec {
                synchronization: notify_core::Synchronization { time: "not-a-duration".into() },
                watch: notify_core::GroupVersionResource {
                    group: "apps".into(),
                    version: "v1".into(),
                    resource: "deployments".into(),
                    namespace: "".into(),
                    name: "".into(),
                },
                extra_resources: vec![],
                conditions: vec![],
                message: notify_core::Message {
                    data: "hi".into(),
                    integration: notify_core::MessageIntegration { name: "hook".into() },
                },
            },
            status: Default::default(),
        };

        let result = reconciler.reconcile(notification);
        let condition = result.status.conditions.iter().find(|c| c.type_ == "ResourceSynced").unwrap();
        assert_eq!(condition.reason, "Misconfigured");
    }
}
