//! Tasklock Agent Daemon

use std::sync::Arc;

use color_eyre::eyre::WrapErr as _;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;

use tasklock_agent::accessibility::{MacHost, get_frontmost_app};
use tasklock_agent::agent::EVENT_BUFFER;
use tasklock_agent::ipc::IpcServer;
use tasklock_agent::storage::JsonFileStore;
use tasklock_agent::{Agent, AgentEvent, Config, Registry, RestrictionStore};

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("tasklock-agent starting");

    let config = match Config::load() {
        Ok(c) => {
            tracing::info!(path = ?Config::config_path(), "configuration loaded");
            c
        }
        Err(e) => {
            tracing::warn!(error = %e, "using default configuration");
            Config::default()
        }
    };

    let storage = JsonFileStore::new(config.storage_path());
    tracing::info!(path = ?storage.path(), "restriction record");
    let store = Arc::new(RestrictionStore::activate(Box::new(storage)));

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let host = Arc::new(MacHost::new(config.application_id.clone(), tx.clone()));

    let registry = Arc::new(Registry::new());
    let server = IpcServer::bind(&config.socket_path).wrap_err("failed to start IPC server")?;
    server
        .serve(Arc::clone(&registry), host.clone())
        .wrap_err("failed to start IPC thread")?;
    registry.activate(Arc::clone(&store));

    // Stop on SIGTERM/SIGINT
    let shutdown = tx.clone();
    let mut sigterm =
        signal(SignalKind::terminate()).wrap_err("failed to install SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).wrap_err("failed to install SIGINT handler")?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
            _ = sigint.recv() => tracing::info!("received SIGINT"),
        }
        let _ = shutdown.send(AgentEvent::Shutdown).await;
    });

    // macOS delivers no focus events to us; poll the frontmost app instead.
    let poll_interval = config.timing.poll_interval();
    let changes = tx.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        let mut last: Option<String> = None;

        loop {
            ticker.tick().await;

            let frontmost = match get_frontmost_app() {
                Ok(Some(bundle_id)) => bundle_id,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(error = %format!("{e:#}"), "could not get frontmost app");
                    continue;
                }
            };

            if last.as_deref() == Some(frontmost.as_str()) {
                continue;
            }
            last = Some(frontmost.clone());

            let event = AgentEvent::WindowChanged {
                application_id: frontmost,
            };
            if changes.send(event).await.is_err() {
                break;
            }
        }
    });

    let agent = Agent::new(host, Arc::clone(&store), &config, tx);
    agent.run(rx).await;

    registry.deactivate();
    server.stop();
    tracing::info!("tasklock-agent stopped");

    Ok(())
}
