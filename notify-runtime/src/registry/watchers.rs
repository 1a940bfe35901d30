use std::time::Duration;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use notify_core::ResourceKey;

use crate::error::DisableError;

/// How many times `disable` polls `started` before giving up, and how far
/// apart the polls are, per `SPEC_FULL.md` §4.3.
const DISABLE_POLL_ATTEMPTS: u32 = 10;
const DISABLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One entry in the [`WatcherRegistry`]: whether the background task for a
/// resource type has acknowledged startup yet, and the means to ask it to
/// stop. `stop` is consumed the first time a caller asks the watcher to
/// stop, matching the one-shot nature of `tokio::sync::oneshot`.
pub struct WatcherHandle {
    started: bool,
    stop: Option<oneshot::Sender<()>>,
}

/// Tracks which resource types currently have a live watcher task, so the
/// Watcher Controller's reconcile loop can tell a freshly-registered type
/// from one whose task has already started, and the cleaner worker can ask a
/// stale watcher to shut down.
#[derive(Default)]
pub struct WatcherRegistry {
    watchers: Mutex<HashMap<ResourceKey, WatcherHandle>>,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watcher slot for `key` and return the receiver half of its
    /// stop signal, for the caller to race against its event stream.
    /// Idempotent-by-replacement: an existing entry for `key` (e.g. one whose
    /// task already exited and flipped `started` back to `false`) is
    /// overwritten with a fresh handle rather than left in place, so the
    /// reconcile loop can always get a usable stop channel back.
    pub fn register(&self, key: ResourceKey) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.watchers.lock().insert(
            key,
            WatcherHandle {
                started: false,
                stop: Some(tx),
            },
        );
        rx
    }

    pub fn set_started(&self, key: &ResourceKey, started: bool) {
        if let Some(handle) = self.watchers.lock().get_mut(key) {
            handle.started = started;
        }
    }

    pub fn is_started(&self, key: &ResourceKey) -> bool {
        self.watchers.lock().get(key).is_some_and(|h| h.started)
    }

    pub fn is_registered(&self, key: &ResourceKey) -> bool {
        self.watchers.lock().contains_key(key)
    }

    /// Signal the watcher for `key` to stop, then poll `started` up to
    /// `DISABLE_POLL_ATTEMPTS` times, `DISABLE_POLL_INTERVAL` apart. Deletes
    /// the entry and returns as soon as the task confirms it has stopped; if
    /// it is still running once the poll budget is spent, leaves the entry
    /// in place and returns `Err(DisableError)` so the caller can retry on
    /// its next sweep instead of tearing down a watcher that is still live.
    pub async fn disable(&self, key: &ResourceKey) -> Result<(), DisableError> {
        {
            let mut watchers = self.watchers.lock();
            let Some(handle) = watchers.get_mut(key) else {
                return Ok(());
            };
            if let Some(stop) = handle.stop.take() {
                let _ = stop.send(());
            }
        }

        for _ in 0..DISABLE_POLL_ATTEMPTS {
            if !self.is_started(key) {
                self.watchers.lock().remove(key);
                return Ok(());
            }
            tokio::time::sleep(DISABLE_POLL_INTERVAL).await;
        }

        Err(DisableError(key.clone()))
    }

    pub fn registered_keys(&self) -> Vec<ResourceKey> {
        self.watchers.lock().keys().cloned().collect()
    }
}
