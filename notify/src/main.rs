//! Bootstrap: parse flags, load configuration, init logging, construct the
//! registries and reconcilers, spawn the Watcher Controller and Sources
//! Controller, and wait for a shutdown signal.
//!
//! The declarative-object reconcilers that would keep the registries fed
//! from live `Notification`/`Integration` CRDs are an external collaborator
//! per `SPEC_FULL.md` §1. This binary constructs the registry-facing
//! reconcilers from `notify_runtime::reconcile` (so the wiring compiles and
//! is exercised by that crate's own tests) but does not stand up a live
//! CRD watch/finalizer loop for them; that belongs to the surrounding
//! operator scaffold this core is embedded in.

mod cli;
mod config;
mod kube_subscription;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use notify_runtime::{
    EventProcessor, IntegrationDispatcher, IntegrationRegistry, NotificationRegistry, SourceRegistry,
    SourcesController, WatcherController, WatcherRegistry,
};

use crate::kube_subscription::KubeSubscription;

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start the async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "fatal bootstrap error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let mut settings = config::load(&cli.config)?;
    cli.apply(&mut settings);

    logging::init();
    info!(config = %cli.config.display(), "configuration loaded");

    let client = kube::Client::try_default()
        .await
        .map_err(|err| anyhow::anyhow!("constructing Kubernetes client: {err}"))?;

    let notifications = Arc::new(NotificationRegistry::new());
    let integrations = Arc::new(IntegrationRegistry::new());
    let watchers = Arc::new(WatcherRegistry::new());
    let sources = Arc::new(SourceRegistry::new());

    let dispatcher = Arc::new(IntegrationDispatcher::new(integrations.clone()));
    let processor = Arc::new(EventProcessor::new(notifications.clone(), sources.clone(), dispatcher));

    let subscription: Arc<dyn notify_runtime::ResourceSubscription> = Arc::new(KubeSubscription::new(client));

    let controller_settings = settings.controller_settings();

    let watcher_controller = WatcherController::new(
        notifications.clone(),
        watchers,
        subscription.clone(),
        processor,
        controller_settings.clone(),
    );
    let sources_controller = SourcesController::new(notifications, sources, subscription, controller_settings);

    let cancellation = CancellationToken::new();

    let watcher_task = tokio::spawn({
        let cancellation = cancellation.clone();
        async move { watcher_controller.run(cancellation).await }
    });
    let sources_task = tokio::spawn({
        let cancellation = cancellation.clone();
        async move { sources_controller.run(cancellation).await }
    });

    info!("watcher controller and sources controller started");
    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping controllers");

    cancellation.cancel();
    let _ = tokio::join!(watcher_task, sources_task);

    info!("shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
