//! beacond — LAN peer discovery daemon.
//!
//! Usage: `beacond [display-name]`

use anyhow::{Context, Result};

use beacon_core::config::BeaconConfig;
use beacon_services::{LivenessPolicy, PeerRegistry};

mod announce;
mod display;
mod interfaces;

use announce::{broadcast, listener};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Load config
    if let Err(e) = BeaconConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = BeaconConfig::load().context("failed to load config")?;

    if let Some(name) = std::env::args().nth(1) {
        config.identity.display_name = name;
    }
    config.validate().context("invalid configuration")?;
    let display_name = config.display_name()?;

    // Who we are
    let local = interfaces::enumerate().context("failed to enumerate network interfaces")?;
    let self_ids = interfaces::self_hardware_ids(&local);
    let max_per_source = match config.network.max_peers_per_address {
        0 => local.len().max(1),
        n => n,
    };
    tracing::info!(
        name = %display_name,
        interfaces = local.len(),
        hardware_ids = self_ids.len(),
        max_per_source,
        "beacond starting"
    );

    let policy = LivenessPolicy::from(&config.liveness);
    let registry = PeerRegistry::new(self_ids, max_per_source, policy);

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let broadcast_task = tokio::spawn(broadcast::broadcast_loop(
        display_name,
        config.network.port,
        config.network.announce_interval(),
    ));

    let listener_task = tokio::spawn(listener::listener_loop(
        registry.clone(),
        config.network.port,
        config.network.recv_buffer_bytes,
    ));

    let display_task = tokio::spawn(display::display_loop(
        registry.clone(),
        config.display.interval(),
        config.display.clear_screen,
    ));

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = broadcast_task     => return exited("broadcast", r),
        r = listener_task      => return exited("listener", r),
        r = display_task       => return exited("display", r),
    }

    Ok(())
}

/// A long-running task returned. Any return is a failure.
fn exited(task: &str, r: Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match r {
        Ok(Err(e)) => {
            tracing::error!(task, error = %e, "task failed");
            Err(e.context(format!("{task} task failed")))
        }
        Ok(Ok(())) => anyhow::bail!("{task} task exited unexpectedly"),
        Err(e) => {
            tracing::error!(task, error = %e, "task panicked");
            Err(e).context(format!("{task} task panicked"))
        }
    }
}
