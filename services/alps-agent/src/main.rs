//! ALPS Reservation Agent
//!
//! Keeps the process-wide reservation registry in step with the external
//! allocator and releases reservations whose jobs are gone.
//!
//! ## Architecture
//!
//! - **Registry**: single shared `ReservationRegistry`, created empty here
//! - **Job source**: live jobs and their reservation attributes
//! - **Allocator**: held reservations and release calls
//! - **Reconciler**: periodic pass tying the three together

use std::sync::Arc;

use alps_agent::config::Config;
use alps_agent::inventory::Inventory;
use alps_agent::{Allocator, JobSource, MockAllocator, Reconciler, ReconcilerConfig, StaticJobSource};
use alps_reservation::ReservationRegistry;
use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str())),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        reconcile_interval_secs = config.reconcile_interval_secs,
        orphan_grace_secs = config.orphan_grace_secs,
        inventory_file = ?config.inventory_file,
        "Starting ALPS reservation agent"
    );

    // Create the in-memory sources
    let (jobs, allocator) = match &config.inventory_file {
        Some(path) => Inventory::load(path)?.into_sources(),
        None => (StaticJobSource::default(), MockAllocator::new()),
    };
    let jobs: Arc<dyn JobSource> = Arc::new(jobs);
    let allocator: Arc<dyn Allocator> = Arc::new(allocator);

    // Create the process-wide registry
    let registry = Arc::new(ReservationRegistry::new());

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start the reconciliation loop
    let reconciler = Reconciler::new(
        Arc::clone(&registry),
        allocator,
        jobs,
        ReconcilerConfig::from(&config),
    );
    let mut reconciler_handle = tokio::spawn(async move {
        reconciler.run(shutdown_rx).await;
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = &mut reconciler_handle => {
            if let Err(e) = result {
                error!(error = %e, "Reconciler task panicked");
            }
            info!("Reconciler exited");
        }
    }

    // Signal shutdown to the reconciler and wait for it
    let _ = shutdown_tx.send(true);
    if !reconciler_handle.is_finished() {
        if let Err(e) = reconciler_handle.await {
            error!(error = %e, "Reconciler task panicked during shutdown");
        }
    }

    info!(
        tracked = registry.count(),
        orphaned = registry.orphan_count(),
        "Reservation agent shutdown complete"
    );
    Ok(())
}
