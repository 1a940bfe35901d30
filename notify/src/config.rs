//! Process configuration: an env-expanded YAML file merged with CLI flags
//! into one [`Settings`] struct.
//!
//! Grounded in the Go original's `cmd/main.go`, which reads the config file,
//! expands `${VAR}` references against the process environment with
//! `os.ExpandEnv`, and only then unmarshals YAML. This crate performs the
//! same two-step rather than relying on a YAML loader's own (nonexistent)
//! environment interpolation.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// A `spec.webhook`-shaped integration entry from the legacy config-file
/// section. No longer consulted by the registry-driven dispatch path (see
/// `DESIGN.md`); kept only so an operator's existing config file still
/// parses instead of failing bootstrap over a section the core no longer
/// needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LegacyIntegration {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub webhook: LegacyWebhook,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LegacyWebhook {
    pub url: String,
    pub verb: String,
    pub headers: HashMap<String, String>,
    pub validator: String,
}

/// Everything the core needs to run, after CLI flags have been merged over
/// whatever the config file supplied. Every field has a default, so an
/// empty or absent config file still produces a working `Settings`; no
/// field is required by the core (see `SPEC_FULL.md` §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub metrics_bind_address: String,
    pub health_probe_bind_address: String,
    pub leader_elect: bool,
    pub metrics_secure: bool,
    pub enable_http2: bool,
    pub enable_watcher_cleaner: bool,

    /// Events processed per second, per watched resource key, best effort.
    /// `0` disables pacing entirely.
    pub events_per_second: u32,

    #[serde(with = "humantime_serde")]
    pub recheck_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub ack_timeout: Duration,

    /// Vestigial: retained for backward-compatible parsing of a config file
    /// written for an older revision that sourced integrations here instead
    /// of from declarative `Integration` objects. Unused.
    #[serde(default)]
    pub integrations: Vec<LegacyIntegration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            metrics_bind_address: ":8080".to_string(),
            health_probe_bind_address: ":8081".to_string(),
            leader_elect: false,
            metrics_secure: false,
            enable_http2: false,
            enable_watcher_cleaner: false,
            events_per_second: 20,
            recheck_interval: Duration::from_secs(2),
            cleanup_interval: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(10),
            integrations: Vec::new(),
        }
    }
}

impl Settings {
    /// Build a [`notify_runtime::ControllerSettings`] from the interval
    /// knobs this struct carries, applying the `0 => disabled` convention
    /// for `events_per_second`.
    pub fn controller_settings(&self) -> notify_runtime::ControllerSettings {
        notify_runtime::ControllerSettings {
            recheck_interval: self.recheck_interval,
            cleanup_interval: self.cleanup_interval,
            ack_timeout: self.ack_timeout,
            enable_cleaner: self.enable_watcher_cleaner,
            events_per_second: (self.events_per_second > 0).then_some(self.events_per_second as f64),
        }
    }
}

/// Load `path`, expanding `${VAR}` references against the process
/// environment before parsing as YAML. A missing file is not an error here
/// (the spec requires "no fields remain required"); only an unreadable
/// *existing* file or malformed YAML is fatal.
pub fn load(path: &Path) -> anyhow::Result<Settings> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(err) => return Err(anyhow::anyhow!("reading configuration file {}: {err}", path.display())),
    };

    let expanded = expand_env(&raw);
    let settings = serde_yaml::from_str(&expanded)
        .map_err(|err| anyhow::anyhow!("parsing configuration file {}: {err}", path.display()))?;
    Ok(settings)
}

/// Replace every `${NAME}` in `input` with the value of the environment
/// variable `NAME`; variables that are unset or not valid UTF-8 are left
/// untouched, matching `os.ExpandEnv`'s "missing means empty" behavior
/// closely enough for a config file (an operator relying on a var that
/// isn't set will notice immediately from the resulting YAML being wrong,
/// rather than bootstrap silently coercing it to an empty string).
fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..start]);
        let name = &rest[start + 2..start + end];
        match std::env::var(name) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
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
