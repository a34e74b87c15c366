//! Ocular Daemon - Main entry point
//!
//! Connects to a sensor, installs its configuration schema and keeps it in
//! line with the desired-state file.

mod config;
mod host;

use anyhow::{Context, Result};
use clap::Parser;
use ocular_channel::SimulatedChannel;
use ocular_core::select_variant;
use ocular_reconfigure::Reconfigure;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::host::{spawn_reconciler, watch_desired, EVENT_QUEUE_DEPTH};

#[derive(Parser, Debug)]
#[command(name = "ocular")]
#[command(about = "Stereo camera reconfiguration daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "ocular.toml")]
    config: PathBuf,

    /// Path to the desired-state file, overriding the configuration. Sensors
    /// with an IMU require an `[imu]` table; sensors without one reject it
    #[arg(short, long)]
    desired: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Reconcile the desired state once, print the report and exit
    #[arg(long)]
    once: bool,

    /// Write a default configuration file, plus a matching desired.toml next
    /// to it, and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Ocular v{}", env!("CARGO_PKG_VERSION"));

    if let Some(path) = args.write_default_config {
        let desired_path = path.with_file_name("desired.toml");
        config::save_default_config(&path, &desired_path)?;
        info!(path = %path.display(), "Wrote default configuration");

        if desired_path.exists() {
            info!(path = %desired_path.display(), "Desired state already exists, leaving it");
        } else {
            let sensor = config::Config::default().sensor;
            let variant = select_variant(sensor.firmware_version, sensor.imager)?;
            config::save_default_desired(&desired_path, variant)?;
            info!(path = %desired_path.display(), schema = %variant, "Wrote default desired state");
        }
        return Ok(());
    }

    // Load configuration
    let mut config = config::load_config(&args.config)?;
    if let Some(desired) = args.desired {
        config.daemon.desired_path = desired;
    }

    info!(
        sensor = %config.sensor.name,
        desired = %config.daemon.desired_path.display(),
        "Configuration loaded"
    );

    let channel = SimulatedChannel::new(config.sensor.clone());
    let mut reconfigure = Reconfigure::new(channel)
        .context("Failed to install a configuration schema for the sensor")?
        .with_resolution_hook(|| {
            info!("Resolution changed, stream consumers must re-negotiate image buffers");
        });

    let device = reconfigure.device_info();
    let version = reconfigure.version_info();
    info!(
        name = %device.name,
        serial = %device.serial_number,
        imager = %device.imager_type,
        firmware = %format!("{:#06x}", version.sensor_firmware_version),
        api = %format!("{:#06x}", version.api_version),
        schema = %reconfigure.variant(),
        "Sensor connected"
    );

    if args.once {
        let desired = config::load_desired(&config.daemon.desired_path)?;
        let report = reconfigure.reconcile(&desired)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    // Daemon mode - reconcile on every change to the desired-state file
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let reconciler = spawn_reconciler(reconfigure, rx, None)?;
    let watcher = tokio::spawn(watch_desired(
        config.daemon.desired_path.clone(),
        Duration::from_millis(config.daemon.poll_interval_ms.max(1)),
        tx,
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    // Dropping the watcher closes the queue, which stops the reconcile thread
    watcher.abort();
    let _ = watcher.await;

    match tokio::task::spawn_blocking(move || reconciler.join()).await? {
        Ok(_) => info!("Reconcile thread stopped"),
        Err(_) => warn!("Reconcile thread panicked"),
    }

    Ok(())
}
