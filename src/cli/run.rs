//! Run command - starts every worker and blocks until shutdown.

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::shutdown::ShutdownSignal;
use crate::supervisor::Supervisor;

/// Run the shipper in the foreground, blocking until shutdown.
pub fn run_foreground() -> Result<()> {
    info!("running pcapshipd in foreground mode");

    let config = Config::load()?;
    info!(config_path = ?config.path, "configuration loaded");

    let shutdown = ShutdownSignal::new();
    let shutdown_for_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        shutdown_for_handler.trigger();
    })?;

    let supervisor = Supervisor::start(&config, shutdown)?;
    supervisor.wait_for_shutdown();

    info!("pcapshipd stopped");
    Ok(())
}
