//! Shared types for the notification engine.
//!
//! This crate carries no orchestrator client and performs no I/O: it is the
//! client-less vocabulary that `notify-runtime` and `notify` build on top of,
//! the same split `kube-core` draws relative to `kube-client`/`kube-runtime`.

mod condition;
mod error;
mod integration;
mod notification;
mod resource_key;

pub use condition::{Condition, ConditionStatus};
pub use error::{Error, Result};
pub use integration::{
    Identity, Integration, IntegrationCredentials, IntegrationSpec, SecretReference, WebhookSpec,
};
pub use notification::{
    GroupVersionResource, Message, MessageIntegration, Notification, NotificationCondition, NotificationSpec,
    NotificationStatus, Synchronization,
};
pub use resource_key::ResourceKey;
