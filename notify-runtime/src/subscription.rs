//! The "resource subscription" boundary.
//!
//! Everything upstream of this trait (the orchestrator's dynamic client,
//! discovery, and informer/relist machinery) lives outside this crate. A
//! [`ResourceSubscription`] is the only thing the Watcher Controller and
//! Sources Controller know about: hand it a [`ResourceKey`], get back a
//! stream of [`WatchEvent`]s for that key until the returned subscription is
//! dropped or the process asks it to stop.
//!
//! The binary crate wires a real cluster-backed implementation; tests in this
//! crate use [`channel_subscription`] instead.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

use notify_core::ResourceKey;

/// One observed change to a watched object, carrying enough of the previous
/// state that condition evaluation and extra-resource lookups don't need a
/// second round trip to the orchestrator.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Added(Value),
    Modified { old: Value, new: Value },
    Deleted(Value),
}

impl WatchEvent {
    /// The object payload a rendered message or condition template should see
    /// for this event: the new state for `Added`/`Modified`, the last-known
    /// state for `Deleted`.
    pub fn observed_object(&self) -> &Value {
        match self {
            WatchEvent::Added(v) | WatchEvent::Deleted(v) => v,
            WatchEvent::Modified { new, .. } => new,
        }
    }
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("subscribing to {key}: {source}")]
    Failed { key: ResourceKey, source: anyhow::Error },
}

/// A live subscription to one resource key. Dropping it should release
/// whatever background work (a watch task, an HTTP long-poll) was backing the
/// stream; implementations typically tie this to the stream itself.
pub type WatchStream = BoxStream<'static, WatchEvent>;

/// Abstracts the orchestrator's dynamic client and informer factory down to a
/// single operation: watch one [`ResourceKey`], get a stream of events.
#[async_trait]
pub trait ResourceSubscription: Send + Sync {
    async fn subscribe(&self, key: &ResourceKey) -> Result<WatchStream, SubscriptionError>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use std::collections::HashMap;

    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    use super::*;

    /// An in-memory [`ResourceSubscription`] that hands out a receiver
    /// created ahead of time by the test. Each key may be subscribed to
    /// exactly once; a second `subscribe` call for the same key fails, since
    /// the real orchestrator-backed implementation has no notion of a
    /// re-claimable stream either.
    #[derive(Default)]
    pub struct ChannelSubscription {
        receivers: parking_lot::Mutex<HashMap<ResourceKey, mpsc::Receiver<WatchEvent>>>,
    }

    impl ChannelSubscription {
        /// Build a subscription source together with the sender half for
        /// each key, so the test can push events after the controller has
        /// subscribed.
        pub fn with_keys(keys: &[ResourceKey]) -> (Self, HashMap<ResourceKey, mpsc::Sender<WatchEvent>>) {
            let mut receivers = HashMap::new();
            let mut senders = HashMap::new();
            for key in keys {
                let (tx, rx) = mpsc::channel(16);
                receivers.insert(key.clone(), rx);
                senders.insert(key.clone(), tx);
            }
            (
                Self {
                    receivers: parking_lot::Mutex::new(receivers),
                },
                senders,
            )
        }
    }

    #[async_trait]
    impl ResourceSubscription for ChannelSubscription {
        async fn subscribe(&self, key: &ResourceKey) -> Result<WatchStream, SubscriptionError> {
            let rx = self.receivers.lock().remove(key).ok_or_else(|| SubscriptionError::Failed {
                key: key.clone(),
                source: anyhow::anyhow!("no receiver registered for this key"),
            })?;
            Ok(Box::pin(ReceiverStream::new(rx)))
        }
    }
}
