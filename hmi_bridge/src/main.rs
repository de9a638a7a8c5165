//! # HMI Bridge Binary
//!
//! Connects panel pins to a machine controller over shared memory.
//!
//! # Usage
//!
//! ```bash
//! # Run against a controller publishing under /dev/shm
//! hmi_bridge --config /etc/hmi/hmi_bridge.toml
//!
//! # Run against the in-process simulated controller
//! hmi_bridge --config config/hmi_bridge.toml --simulate
//!
//! # Verbose JSON logs
//! hmi_bridge --config config/hmi_bridge.toml -v --json
//! ```

use clap::Parser;
use hmi_bridge::channel::DiagnosticsGate;
use hmi_bridge::lifecycle::Lifecycle;
use hmi_bridge::pins::ShmPinBus;
use hmi_bridge::transport::Transport;
use hmi_bridge::transport::shm::ShmTransport;
use hmi_bridge::transport::sim::SimController;
use hmi_common::config::{ConfigLoader, HmiConfig};
use hmi_common::consts::DEFAULT_CONFIG_PATH;
use hmi_shm::DEFAULT_SHM_ROOT;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Targets silenced while connect retries run.
const QUIET_TARGETS: &str = "hmi_bridge::transport=off,hmi_bridge::channel=off,hmi_shm=off";

/// HMI Bridge - panel pins to controller commands and status
#[derive(Parser, Debug)]
#[command(name = "hmi_bridge")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Operator-interface bridge between panel pins and a machine controller")]
#[command(long_about = None)]
struct Args {
    /// Path to the bridge configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Use the in-process simulated controller instead of shared memory
    #[arg(short = 's', long)]
    simulate: bool,

    /// Directory holding the shared-memory segment files
    #[arg(long, value_name = "DIR", default_value = DEFAULT_SHM_ROOT)]
    shm_root: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

/// Swaps the log filter through a reload handle.
struct ReloadGate {
    handle: reload::Handle<EnvFilter, Registry>,
    base: Mutex<String>,
}

impl ReloadGate {
    fn apply(&self, directives: &str) {
        if let Err(e) = self.handle.reload(EnvFilter::new(directives)) {
            warn!("Failed to reload log filter: {e}");
        }
    }

    fn set_base(&self, directives: &str) {
        *self.base.lock() = directives.to_string();
        self.apply(directives);
    }
}

impl DiagnosticsGate for ReloadGate {
    fn suppress(&self) {
        let base = self.base.lock().clone();
        self.apply(&format!("{base},{QUIET_TARGETS}"));
    }

    fn restore(&self) {
        let base = self.base.lock().clone();
        self.apply(&base);
    }
}

fn main() {
    if let Err(e) = run() {
        error!("HMI bridge failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let env_directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let gate = setup_tracing(&args, env_directives.as_deref());

    info!("HMI bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = HmiConfig::load(&args.config).map_err(|e| {
        format!("failed to load {}: {e}", args.config.display())
    })?;
    if env_directives.is_none() && !args.verbose {
        gate.set_base(config.shared.log_level.as_directive());
    }
    info!(
        "Loaded config: channel_id={}, {} axes, {} MDI commands, wait_policy={:?}",
        config.bridge.channel_id,
        config.axis_count(),
        config.mdi_commands.len(),
        config.bridge.wait_policy
    );

    let transport: Box<dyn Transport> = if args.simulate {
        info!("Simulation mode enabled");
        Box::new(SimController::new(config.axis_count()).transport())
    } else {
        Box::new(ShmTransport::new(&args.shm_root, &config.bridge.channel_id))
    };
    let bus = ShmPinBus::new(&args.shm_root, &config.bridge.channel_id)?;

    let mut lifecycle = Lifecycle::new(&config, transport, gate.clone(), bus)?;
    lifecycle.startup()?;

    let running = lifecycle.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    if let Err(e) = lifecycle.run() {
        error!("Bridge loop error: {e}");
    }
    lifecycle.shutdown();

    info!("HMI bridge shutdown complete");
    Ok(())
}

/// Install the subscriber; `RUST_LOG` wins over `-v`.
fn setup_tracing(args: &Args, env_directives: Option<&str>) -> Arc<ReloadGate> {
    let base = match env_directives {
        Some(directives) => directives.to_string(),
        None if args.verbose => "debug".to_string(),
        None => "info".to_string(),
    };

    let (filter, handle) = reload::Layer::new(EnvFilter::new(&base));
    let registry = tracing_subscriber::registry().with(filter);
    if args.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    Arc::new(ReloadGate {
        handle,
        base: Mutex::new(base),
    })
}
