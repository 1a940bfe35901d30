//! The cluster-backed [`ResourceSubscription`]: the only place this binary
//! talks to a real orchestrator API. Everything upstream of this module
//! (registries, controllers, the event processor, the dispatcher) only ever
//! sees the abstract trait from `notify_runtime::subscription`.
//!
//! Resolving a bare `(group, version, resource)` triple to the
//! [`ApiResource`] a dynamic `Api` needs is discovery's job: the plural
//! `resource` name a `ResourceKey` carries isn't enough on its own to build
//! a request path without knowing the `kind`'s discovery metadata too.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future;
use futures::stream::StreamExt;
use kube::core::DynamicObject;
use kube::discovery::Discovery;
use kube::runtime::watcher::{self, Event as WatcherEvent};
use kube::{Api, Client, Resource as _};
use serde_json::Value;
use tracing::warn;

use notify_core::ResourceKey;
use notify_runtime::{ResourceSubscription, SubscriptionError, WatchEvent, WatchStream};

/// `(namespace, name)` identity read off a [`DynamicObject`]'s metadata.
type Identity = (Option<String>, String);

fn identity_of(obj: &DynamicObject) -> Identity {
    (obj.namespace(), obj.name_any())
}

/// Resolves `ResourceKey`s against the cluster's discovery document and
/// streams watch events through a single shared [`kube::Client`].
pub struct KubeSubscription {
    client: Client,
}

impl KubeSubscription {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn resolve(&self, group: &str, version: &str, resource: &str) -> Result<kube::discovery::ApiResource, SubscriptionError> {
        let discovery = Discovery::new(self.client.clone())
            .run()
            .await
            .map_err(|err| SubscriptionError::Failed {
                key: ResourceKey::new(group, version, resource, "", ""),
                source: err.into(),
            })?;

        for api_group in discovery.groups() {
            for (candidate, _capabilities) in api_group.resources_by_stability() {
                if candidate.group == group && candidate.version == version && candidate.plural == resource {
                    return Ok(candidate);
                }
            }
        }

        Err(SubscriptionError::Failed {
            key: ResourceKey::new(group, version, resource, "", ""),
            source: anyhow::anyhow!("no API resource matches group='{group}' version='{version}' resource='{resource}' in the cluster's discovery document"),
        })
    }
}

#[async_trait]
impl ResourceSubscription for KubeSubscription {
    async fn subscribe(&self, key: &ResourceKey) -> Result<WatchStream, SubscriptionError> {
        let [group, version, resource, namespace, name] = key.fields();

        let api_resource = self.resolve(group, version, resource).await?;

        let api: Api<DynamicObject> = if namespace.is_empty() {
            Api::all_with(self.client.clone(), &api_resource)
        } else {
            Api::namespaced_with(self.client.clone(), namespace, &api_resource)
        };

        let mut config = watcher::Config::default();
        if !name.is_empty() {
            config = config.fields(&format!("metadata.name={name}"));
        }

        let raw = watcher::watcher(api, config);
        let mapped = raw
            .scan(HashMap::<Identity, Value>::new(), |cache, event| {
                let outcome = match event {
                    Ok(WatcherEvent::InitApply(obj)) | Ok(WatcherEvent::Apply(obj)) => {
                        let value = serde_json::to_value(&obj).unwrap_or(Value::Null);
                        let previous = cache.insert(identity_of(&obj), value.clone());
                        Some(Some(match previous {
                            Some(old) => WatchEvent::Modified { old, new: value },
                            None => WatchEvent::Added(value),
                        }))
                    }
                    Ok(WatcherEvent::Delete(obj)) => {
                        let value = serde_json::to_value(&obj).unwrap_or(Value::Null);
                        cache.remove(&identity_of(&obj));
                        Some(Some(WatchEvent::Deleted(value)))
                    }
                    Ok(WatcherEvent::Init) | Ok(WatcherEvent::InitDone) => Some(None),
                    Err(err) => {
                        warn!(error = %err, "watch stream errored, subscription will end and restart on next sweep");
                        None
                    }
                };
                future::ready(outcome)
            })
            .take_while(|item| future::ready(item.is_some()))
            .filter_map(|item| future::ready(item.flatten()));

        Ok(Box::pin(mapped))
    }
}
