//! Structured logging, initialized once at process start. Every other
//! module reaches `tracing`'s macros directly; nothing downstream of this
//! call touches `println!`/`eprintln!`.

use tracing_subscriber::EnvFilter;

/// Initialize the global `tracing` subscriber from `RUST_LOG`, defaulting
/// to `info` when the variable is unset or unparsable. Same default the Go
/// original's `zap.Options{Development: true}` settles on absent an
/// explicit verbosity flag.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}
