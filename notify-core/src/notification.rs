use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::resource_key::ResourceKey;

/// Namespace/name identity shared by `Notification` and `Integration`.
pub type Identity = (Option<String>, String);

/// `spec.watch` / `spec.extraResources[]` entry before it is joined into a
/// [`ResourceKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
}

impl GroupVersionResource {
    pub fn to_resource_key(&self) -> ResourceKey {
        ResourceKey::new(&self.group, &self.version, &self.resource, &self.namespace, &self.name)
    }
}

/// A single `spec.conditions[]` entry: a template evaluated against the event
/// context, compared by string equality against `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCondition {
    pub key: String,
    pub value: String,
}

/// `spec.message`: the template to render plus the name of the integration to
/// hand the rendered string to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub data: String,
    pub integration: MessageIntegration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageIntegration {
    pub name: String,
}

/// `spec.synchronization`: currently advisory only (see `SPEC_FULL.md` §9:
/// accepted, validated, stored, never wired to a requeue timer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synchronization {
    pub time: String,
}

impl Synchronization {
    /// Parse `time` as a duration, for reconcilers that want to validate the
    /// field without acting on it.
    pub fn parse_time(&self) -> Result<std::time::Duration, humantime::DurationError> {
        humantime::parse_duration(&self.time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSpec {
    pub synchronization: Synchronization,
    pub watch: GroupVersionResource,
    #[serde(default)]
    pub extra_resources: Vec<GroupVersionResource>,
    #[serde(default)]
    pub conditions: Vec<NotificationCondition>,
    pub message: Message,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// The declarative `Notification` object: what to watch and what to say.
///
/// `namespace`/`name` form the [`Identity`] the registries key on; at most
/// one `Notification` per identity is ever live in the Notification Registry
/// (see `notify_runtime::registry::NotificationRegistry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub namespace: String,
    pub name: String,
    pub spec: NotificationSpec,
    #[serde(default)]
    pub status: NotificationStatus,
}

impl Notification {
    pub fn identity(&self) -> Identity {
        (Some(self.namespace.clone()), self.name.clone())
    }

    pub fn watch_key(&self) -> ResourceKey {
        self.spec.watch.to_resource_key()
    }

    pub fn extra_keys(&self) -> Vec<ResourceKey> {
        self.spec
            .extra_resources
            .iter()
            .map(GroupVersionResource::to_resource_key)
            .collect()
    }
}
