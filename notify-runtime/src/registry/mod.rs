//! In-memory registries the controllers and the event processor share.
//!
//! Each registry is a thin `parking_lot::Mutex`-guarded map; critical
//! sections are always a handful of map operations, never I/O, so a
//! synchronous lock is the right tool (matching the short-critical-section
//! locking used throughout `kube::runtime::reflector::Store`).

mod integrations;
mod notifications;
mod sources;
mod watchers;

pub use integrations::IntegrationRegistry;
pub use notifications::NotificationRegistry;
pub use sources::SourceRegistry;
pub use watchers::WatcherRegistry;
