//! CLI entry point for the synthetic sensor simulator.

use anyhow::{bail, Context, Result};
use clap::Parser;
use iot_sim::config::constants::paths::DEFAULT_CONFIG_FILE;
use iot_sim::config::ConfigLoader;
use iot_sim::scheduler::SimulationScheduler;
use iot_sim::transport::{MemoryTransport, MqttTransport, Transport};
use iot_sim::utils::shared_rng;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

#[derive(Parser)]
#[command(name = "iot-sim")]
#[command(about = "Publish synthetic sensor waveforms for a fleet of devices over MQTT")]
#[command(version)]
struct Cli {
    /// Configuration file (JSON, or TOML by extension); created with defaults if missing
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log every publish and connection event
    #[arg(short, long)]
    verbose: bool,

    /// Record publishes in memory instead of connecting to the broker
    #[arg(long)]
    dry_run: bool,

    /// Publish this many ticks per device, then exit
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Seed for client ids and noise generators
    #[arg(long)]
    seed: Option<u64>,

    /// Skip devices with unsupported waveforms instead of aborting
    #[arg(long)]
    lenient: bool,
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "info"
    } else {
        "warn"
    }
}

/// Install the subscriber before anything logs; `RUST_LOG` wins when set
fn init_logging(verbose: bool) -> Option<FilterHandle> {
    let from_env = EnvFilter::try_from_default_env().ok();
    let env_set = from_env.is_some();
    let (filter, handle) = reload::Layer::new(
        from_env.unwrap_or_else(|| EnvFilter::new(default_level(verbose))),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
    (!env_set).then_some(handle)
}

/// Raise the default filter once the config file asks for verbose output
fn apply_config_verbosity(handle: Option<&FilterHandle>, cli_verbose: bool, config_verbose: bool) {
    let Some(handle) = handle else {
        return;
    };
    if config_verbose && !cli_verbose {
        if let Err(e) = handle.reload(EnvFilter::new(default_level(true))) {
            warn!(error = %e, "Unable to raise log level");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = init_logging(cli.verbose);
    info!(version = iot_sim::VERSION, config = %cli.config.display(), "iot-sim starting");

    let loader = ConfigLoader::new(&cli.config);
    loader
        .ensure_exists()
        .with_context(|| format!("failed to create {}", cli.config.display()))?;
    let mut config = loader
        .load()
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    apply_config_verbosity(log_filter.as_ref(), cli.verbose, config.verbose);
    config.verbose |= cli.verbose;

    let memory = MemoryTransport::new();
    let transport: Arc<dyn Transport> = if cli.dry_run {
        info!("Dry run: publishes are recorded in memory");
        Arc::new(memory.clone())
    } else {
        Arc::new(MqttTransport::new(config.verbose))
    };

    let rng = shared_rng(cli.seed);
    let built = if cli.lenient {
        SimulationScheduler::new(&config, transport, rng)
    } else {
        SimulationScheduler::strict(&config, transport, rng)
    };
    let scheduler = match built {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!(error = %e, "Cannot start simulation");
            return Err(e.into());
        }
    };

    info!(
        devices = ?scheduler.device_ids(),
        broker = %format!("{}:{}", config.mqtt.uri, config.mqtt.port),
        "Simulation configured"
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    println!("Simulation stopped by user.");
                    cancel.cancel();
                }
                Err(e) => error!(error = %e, "Unable to listen for Ctrl-C"),
            }
        });
    }

    let report = match cli.ticks {
        Some(ticks) => scheduler.run_ticks(ticks, cancel).await,
        None => scheduler.run(cancel).await,
    };

    if cli.dry_run {
        info!(messages = memory.message_count(), "Dry run finished");
    }

    let failed = report.failed_devices();
    if report.all_failed() {
        bail!("no device could run: {}", failed.join(", "));
    }
    if !failed.is_empty() {
        warn!(devices = ?failed, "Some devices failed");
    }

    Ok(())
}
