//! The Watcher Controller and Sources Controller: the two control loops that
//! keep [`WatcherRegistry`]/[`SourceRegistry`] converged with
//! [`NotificationRegistry`], plus the per-key subscription tasks they spawn.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use notify_core::ResourceKey;

use crate::processor::EventProcessor;
use crate::registry::{NotificationRegistry, SourceRegistry, WatcherRegistry};
use crate::subscription::{ResourceSubscription, WatchEvent};

/// Tuning knobs for both controllers, threaded in from process configuration.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub recheck_interval: Duration,
    pub cleanup_interval: Duration,
    pub ack_timeout: Duration,
    pub enable_cleaner: bool,
    /// `None`/zero disables the per-key pacing between processor
    /// invocations; a positive value inserts `1s / events_per_second`.
    pub events_per_second: Option<f64>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            recheck_interval: Duration::from_secs(2),
            cleanup_interval: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(10),
            enable_cleaner: true,
            events_per_second: None,
        }
    }
}

/// Converges the [`WatcherRegistry`] with [`NotificationRegistry::watch_keys`]
/// and feeds every observed event to the [`EventProcessor`].
pub struct WatcherController {
    notifications: Arc<NotificationRegistry>,
    watchers: Arc<WatcherRegistry>,
    subscription: Arc<dyn ResourceSubscription>,
    processor: Arc<EventProcessor>,
    settings: ControllerSettings,
}

impl WatcherController {
    pub fn new(
        notifications: Arc<NotificationRegistry>,
        watchers: Arc<WatcherRegistry>,
        subscription: Arc<dyn ResourceSubscription>,
        processor: Arc<EventProcessor>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            notifications,
            watchers,
            subscription,
            processor,
            settings,
        }
    }

    /// Spawn the reconcile loop, the cleaner loop (if enabled), and return
    /// once `cancellation` fires. Both loops run concurrently for the
    /// lifetime of the returned future.
    pub async fn run(&self, cancellation: CancellationToken) {
        let reconcile = self.reconcile_loop(cancellation.clone());
        let cleaner = self.cleaner_loop(cancellation.clone());

        if self.settings.enable_cleaner {
            tokio::join!(reconcile, cleaner);
        } else {
            reconcile.await;
        }
    }

    async fn reconcile_loop(&self, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.recheck_interval);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => return,
                _ = ticker.tick() => {}
            }

            for key in self.notifications.watch_keys() {
                if self.watchers.is_registered(&key) && self.watchers.is_started(&key) {
                    continue;
                }

                self.spawn_subscription(key.clone(), cancellation.child_token());

                let watchers = self.watchers.clone();
                let ack_timeout = self.settings.ack_timeout;
                let ack_key = key.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(ack_timeout).await;
                    if !watchers.is_started(&ack_key) {
                        warn!(key = %ack_key, "watcher did not acknowledge startup within ack_timeout");
                    }
                });
            }
        }
    }

    async fn cleaner_loop(&self, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.cleanup_interval);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let live = self.notifications.watch_keys();
            for key in self.watchers.registered_keys() {
                if !live.contains(&key) {
                    if let Err(err) = self.watchers.disable(&key).await {
                        warn!(key = %key, error = %err, "watcher did not stop within the poll budget, will retry next sweep");
                    }
                }
            }
        }
    }

    fn spawn_subscription(&self, key: ResourceKey, stop_token: CancellationToken) {
        let stop = self.watchers.register(key.clone());
        self.watchers.set_started(&key, true);

        let subscription = self.subscription.clone();
        let processor = self.processor.clone();
        let watchers = self.watchers.clone();
        let events_per_second = self.settings.events_per_second;

        tokio::spawn(async move {
            let _guard = StartedGuard { watchers: &watchers, key: &key };

            let mut stop_rx = stop;
            let stream = match subscription.subscribe(&key).await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(key = %key, error = %err, "opening subscription failed, will retry on next sweep");
                    return;
                }
            };
            tokio::pin!(stream);

            loop {
                let event = tokio::select! {
                    _ = &mut stop_rx => return,
                    _ = stop_token.cancelled() => return,
                    event = stream.next() => event,
                };

                let Some(event) = event else {
                    info!(key = %key, "subscription stream ended, will restart on next sweep");
                    return;
                };

                process_event(&processor, &key, &event).await;

                if let Some(eps) = events_per_second.filter(|eps| *eps > 0.0) {
                    tokio::time::sleep(Duration::from_secs_f64(1.0 / eps)).await;
                }
            }
        });
    }
}

async fn process_event(processor: &EventProcessor, key: &ResourceKey, event: &WatchEvent) {
    processor.process(key, event).await;
}

/// Flips `started` back to `false` when the subscription task unwinds, by
/// any path (stream error, stop signal, stream end): the deferred update
/// the spec calls for.
struct StartedGuard<'a> {
    watchers: &'a WatcherRegistry,
    key: &'a ResourceKey,
}

impl Drop for StartedGuard<'_> {
    fn drop(&mut self) {
        self.watchers.set_started(self.key, false);
    }
}

/// Converges the [`SourceRegistry`] with
/// [`NotificationRegistry::extra_keys`]; writes snapshots into the registry's
/// item pool instead of invoking the [`EventProcessor`].
pub struct SourcesController {
    notifications: Arc<NotificationRegistry>,
    sources: Arc<SourceRegistry>,
    subscription: Arc<dyn ResourceSubscription>,
    settings: ControllerSettings,
}

impl SourcesController {
    pub fn new(
        notifications: Arc<NotificationRegistry>,
        sources: Arc<SourceRegistry>,
        subscription: Arc<dyn ResourceSubscription>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            notifications,
            sources,
            subscription,
            settings,
        }
    }

    pub async fn run(&self, cancellation: CancellationToken) {
        let reconcile = self.reconcile_loop(cancellation.clone());
        let cleaner = self.cleaner_loop(cancellation.clone());

        if self.settings.enable_cleaner {
            tokio::join!(reconcile, cleaner);
        } else {
            reconcile.await;
        }
    }

    async fn reconcile_loop(&self, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.recheck_interval);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => return,
                _ = ticker.tick() => {}
            }

            for key in self.notifications.extra_keys() {
                if self.sources.is_registered(&key) && self.sources.is_started(&key) {
                    continue;
                }
                self.spawn_subscription(key, cancellation.child_token());
            }
        }
    }

    async fn cleaner_loop(&self, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.cleanup_interval);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let live = self.notifications.extra_keys();
            for key in self.sources.registered_keys() {
                if !live.contains(&key) {
                    if let Err(err) = self.sources.disable(&key).await {
                        warn!(key = %key, error = %err, "source did not stop within the poll budget, will retry next sweep");
                    }
                }
            }
        }
    }

    fn spawn_subscription(&self, key: ResourceKey, stop_token: CancellationToken) {
        let stop = self.sources.register(key.clone());
        self.sources.set_started(&key, true);

        let subscription = self.subscription.clone();
        let sources = self.sources.clone();

        tokio::spawn(async move {
            struct SourceStartedGuard<'a> {
                sources: &'a SourceRegistry,
                key: &'a ResourceKey,
            }
            impl Drop for SourceStartedGuard<'_> {
                fn drop(&mut self) {
                    self.sources.set_started(self.key, false);
                }
            }
            let _guard = SourceStartedGuard { sources: &sources, key: &key };

            let mut stop_rx = stop;
            let stream = match subscription.subscribe(&key).await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(key = %key, error = %err, "opening source subscription failed, will retry on next sweep");
                    return;
                }
            };
            tokio::pin!(stream);

            loop {
                let event = tokio::select! {
                    _ = &mut stop_rx => return,
                    _ = stop_token.cancelled() => return,
                    event = stream.next() => event,
                };

                let Some(event) = event else { return };

                match event {
                    WatchEvent::Added(item) | WatchEvent::Modified { new: item, .. } => {
                        sources.put_item(&key, item);
                    }
                    WatchEvent::Deleted(item) => {
                        sources.remove_item(&key, &item);
                    }
                }
            }
        });
    }
}
