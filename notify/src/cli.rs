//! CLI surface, mirroring the Go original's `flag.*Var` calls in
//! `cmd/main.go` one-for-one (see `SPEC_FULL.md` §6).

use std::path::PathBuf;

use clap::Parser;

use crate::config::Settings;

#[derive(Debug, Parser)]
#[command(name = "notify", about = "Cluster-aware notification engine")]
pub struct Cli {
    /// The address the metrics endpoint binds to.
    #[arg(long)]
    pub metrics_bind_address: Option<String>,

    /// The address the health probe endpoint binds to.
    #[arg(long)]
    pub health_probe_bind_address: Option<String>,

    /// Enable leader election so only one replica is active at a time.
    #[arg(long)]
    pub leader_elect: bool,

    /// Serve the metrics endpoint over TLS.
    #[arg(long)]
    pub metrics_secure: bool,

    /// Enable HTTP/2 for the metrics server.
    #[arg(long)]
    pub enable_http2: bool,

    /// Path to the configuration YAML file.
    #[arg(long, default_value = "notify.yaml")]
    pub config: PathBuf,

    /// Events processed per second per watched resource key, best effort.
    #[arg(long)]
    pub events_per_second: Option<u32>,

    /// Enable the Watcher Registry cleaner loop for orphaned watchers.
    #[arg(long)]
    pub enable_watcher_cleaner: bool,
}

impl Cli {
    /// Apply flags that were actually supplied on top of `settings` (which
    /// already reflects the config file). Boolean flags only ever turn a
    /// setting on here, matching `clap`'s `ArgAction::SetTrue` semantics.
    /// There is no CLI-level way to force one back off once the config file
    /// set it, same as the Go original's plain `bool` flags.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(addr) = &self.metrics_bind_address {
            settings.metrics_bind_address = addr.clone();
        }
        if let Some(addr) = &self.health_probe_bind_address {
            settings.health_probe_bind_address = addr.clone();
        }
        if self.leader_elect {
            settings.leader_elect = true;
        }
        if self.metrics_secure {
            settings.metrics_secure = true;
        }
        if self.enable_http2 {
            settings.enable_http2 = true;
        }
        if self.enable_watcher_cleaner {
            settings.enable_watcher_cleaner = true;
        }
        if let Some(eps) = self.events_per_second {
            settings.events_per_second = eps;
        }
    }
}
