//! joycmd daemon
//!
//! Watches joystick devices and runs shell commands when configured button
//! combos are pressed.

mod combo;
mod daemon;
mod device;
mod dispatcher;
mod logging;
mod multiplexer;
mod registry;
mod scanner;
mod session;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use joycmd_config::{Config, DEFAULT_CONFIG_PATH};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

use crate::daemon::Daemon;
use crate::device::JoystickProbe;
use crate::dispatcher::CommandDispatcher;

#[derive(Parser, Debug)]
#[command(name = "joycmd")]
#[command(about = "Run shell commands on joystick button combos")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log every button transition and dispatched command
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let log_control = logging::init(args.debug);

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&args.config).into_owned().into();

    let config = prepare_config(&config_path)?;
    log_control.apply_config_level(config.global.log_level);

    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => {
                tracing::info!("Received {}, shutting down...", name);
                let _ = stop.send(true);
            }
            Err(e) => {
                tracing::error!("Failed to install signal handlers: {}", e);
                // Keep the sender alive so the daemon keeps running
                std::future::pending::<()>().await;
            }
        }
    });

    let dispatcher = CommandDispatcher::new(
        config.global.dispatch,
        config.global.shell.clone(),
        config.global.shutdown_grace,
    );

    tracing::info!("joycmd daemon starting...");

    let mut daemon = Daemon::new(config, JoystickProbe, dispatcher);
    daemon.run(shutdown).await;
    daemon.into_dispatcher().shutdown().await;

    tracing::info!("joycmd daemon stopped");

    Ok(())
}

/// Create the default configuration if needed, then load it.
///
/// A file that cannot be created is not fatal: loading falls back to the
/// built-in defaults.
fn prepare_config(config_path: &Path) -> Result<Config> {
    match joycmd_config::ensure_config_exists(config_path) {
        Ok(true) => {
            tracing::info!("Created default configuration at {}", config_path.display());
        }
        Ok(false) => {}
        Err(e) => {
            tracing::warn!("Could not create {}: {}", config_path.display(), e);
        }
    }

    let config = joycmd_config::load_config(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    tracing::info!(
        "Loaded configuration from {} ({} section(s), {} combo(s))",
        config_path.display(),
        config.devices.len(),
        config.combo_count()
    );
    if config.combo_count() == 0 {
        tracing::warn!("No valid combos configured, devices will be watched but nothing will run");
    }

    Ok(config)
}

/// Resolves with the name of the first SIGINT or SIGTERM received.
async fn wait_for_signal() -> std::io::Result<&'static str> {
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}
