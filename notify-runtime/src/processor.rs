//! For each incoming object event, evaluates every subscribed notification's
//! predicates, renders its message, and hands it to the dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use notify_core::{Notification, ResourceKey};

use crate::dispatcher::IntegrationDispatcher;
use crate::registry::{NotificationRegistry, SourceRegistry};
use crate::subscription::WatchEvent;
use crate::template::{self, EventContext};

/// Evaluates conditions and renders messages for every notification
/// subscribed to the `ResourceKey` an event arrived on, then dispatches.
pub struct EventProcessor {
    notifications: Arc<NotificationRegistry>,
    sources: Arc<SourceRegistry>,
    dispatcher: Arc<IntegrationDispatcher>,
}

impl EventProcessor {
    pub fn new(
        notifications: Arc<NotificationRegistry>,
        sources: Arc<SourceRegistry>,
        dispatcher: Arc<IntegrationDispatcher>,
    ) -> Self {
        Self {
            notifications,
            sources,
            dispatcher,
        }
    }

    /// Process one event observed for `key`. Never returns an error: every
    /// per-notification failure is logged and the remaining notifications
    /// are still evaluated, matching the processor's "never aborts"
    /// propagation policy.
    pub async fn process(&self, key: &ResourceKey, event: &WatchEvent) {
        let subscribed = self.notifications.watching(key);
        if subscribed.is_empty() {
            return;
        }

        let mut context = EventContext::from_event(event);
        attach_sources(&mut context, &subscribed, &self.sources);

        for notification in &subscribed {
            if !self.conditions_match(notification, &context) {
                continue;
            }

            let rendered = match template::render(&notification.spec.message.data, &context) {
                Ok(rendered) => rendered,
                Err(err) => {
                    warn!(
                        notification = %notification_label(notification),
                        object = %context.object,
                        error = %err,
                        "message template failed to render"
                    );
                    continue;
                }
            };

            let integration_name = &notification.spec.message.integration.name;
            if let Err(err) = self.dispatcher.send_message(integration_name, &rendered).await {
                warn!(
                    notification = %notification_label(notification),
                    integration = integration_name,
                    error = %err,
                    "dispatching rendered message failed"
                );
            }
        }
    }

    /// Evaluate every condition in declared order, short-circuiting on the
    /// first mismatch or template failure.
    fn conditions_match(&self, notification: &Notification, context: &EventContext) -> bool {
        for condition in &notification.spec.conditions {
            let rendered = match template::render(&condition.key, context) {
                Ok(rendered) => rendered,
                Err(err) => {
                    warn!(
                        notification = %notification_label(notification),
                        object = %context.object,
                        error = %err,
                        "condition template failed to render"
                    );
                    return false;
                }
            };

            if rendered != condition.value {
                return false;
            }
        }
        true
    }
}

fn notification_label(notification: &Notification) -> String {
    format!("{}/{}", notification.namespace, notification.name)
}

/// Populate `context.sources` with the latest pooled snapshots for every
/// extra-resource key these specific notifications reference, not eagerly
/// for every key the Source Registry happens to know about.
fn attach_sources(context: &mut EventContext, notifications: &[Arc<Notification>], sources: &SourceRegistry) {
    let mut by_key: HashMap<String, Vec<Value>> = HashMap::new();
    for notification in notifications {
        for extra_key in notification.extra_keys() {
            by_key
                .entry(extra_key.as_str().to_string())
                .or_insert_with(|| sources.items(&extra_key).iter().map(|item| (**item).clone()).collect());
        }
    }
    context.sources = by_key;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::{body_string, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use notify_core::{
        GroupVersionResource, Integration, IntegrationSpec, Message, MessageIntegration, Notification,
        NotificationCondition, NotificationSpec, Synchronization, WebhookSpec,
    };

    use super::*;
    use crate::registry::IntegrationRegistry;

    fn watch_key() -> ResourceKey {
        ResourceKey::new("apps", "v1", "deployments", "", "")
    }

    fn notification_with_condition(key: &str, value: &str) -> Notification {
        Notification {
            namespace: "default".into(),
            name: "n1".into(),
            spec: NotificationSpec {
                synchronization: Synchronization { time: "5m".into() },
                watch: GroupVersionResource {
                    group: "apps".into(),
                    version: "v1".into(),
                    resource: "deployments".into(),
                    namespace: "".into(),
                    name: "".into(),
                },
                extra_resources: vec![],
                conditions: vec![NotificationCondition {
                    key: key.into(),
                    value: value.into(),
                }],
                message: Message {
                    data: "alert:{{ object.metadata.name }}".into(),
                    integration: MessageIntegration { name: "hook".into() },
                },
            },
            status: Default::default(),
        }
    }

    async fn dispatcher_pointing_at(server: &MockServer) -> Arc<IntegrationDispatcher> {
        let integrations = Arc::new(IntegrationRegistry::new());
        integrations.upsert(Integration {
            name: "hook".into(),
            spec: IntegrationSpec {
                type_: "webhook".into(),
                webhook: WebhookSpec {
                    url: server.uri(),
                    verb: "POST".into(),
                    headers: Default::default(),
                    validator: None,
                },
                ..Default::default()
            },
            status: Default::default(),
        });
        Arc::new(IntegrationDispatcher::new(integrations))
    }

    #[tokio::test]
    async fn matching_condition_dispatches_the_rendered_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string("alert:api"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifications = Arc::new(NotificationRegistry::new());
        notifications.upsert(notification_with_condition("{{ object.kind }}", "Deployment"));
        let sources = Arc::new(SourceRegistry::new());
        let dispatcher = dispatcher_pointing_at(&server).await;

        let processor = EventProcessor::new(notifications, sources, dispatcher);
        let event = WatchEvent::Added(json!({"kind": "Deployment", "metadata": {"name": "api", "namespace": "p"}}));
        processor.process(&watch_key(), &event).await;
    }

    #[tokio::test]
    async fn condition_miss_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let notifications = Arc::new(NotificationRegistry::new());
        notifications.upsert(notification_with_condition("{{ object.kind }}", "Deployment"));
        let sources = Arc::new(SourceRegistry::new());
        let dispatcher = dispatcher_pointing_at(&server).await;

        let processor = EventProcessor::new(notifications, sources, dispatcher);
        let event = WatchEvent::Added(json!({"kind": "Service", "metadata": {"name": "s"}}));
        processor.process(&watch_key(), &event).await;
    }

    #[tokio::test]
    async fn template_failure_skips_the_notification_without_dispatching() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let notifications = Arc::new(NotificationRegistry::new());
        notifications.upsert(notification_with_condition("{{ object.missing.field", "anything"));
        let sources = Arc::new(SourceRegistry::new());
        let dispatcher = dispatcher_pointing_at(&server).await;

        let processor = EventProcessor::new(notifications, sources, dispatcher);
        let event = WatchEvent::Added(json!({"kind": "Deployment"}));
        processor.process(&watch_key(), &event).await;
    }
}
