//! detector-led - Main Entry Point
//!
//! Brings the network up, keeps a subscribed broker session alive and drives
//! the LED from every message on the detection topic.

use clap::{Parser, Subcommand};
use detector_led::actuator::build_actuator;
use detector_led::config::DeviceConfig;
use detector_led::observability::init_default_logging;
use detector_led::{Device, DeviceResult, HostLink, MqttSession};
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tracing::{error, info};

/// LED driven by an MQTT detection topic
#[derive(Parser)]
#[command(name = "detector-led")]
#[command(about = "Drive an LED from a numeric detection signal received over MQTT")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "DETECTOR_LED_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and drive the LED until interrupted
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    info!("Starting detector-led v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_device(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(config_path: &Option<PathBuf>) -> DeviceResult<DeviceConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(DeviceConfig::load_from_file(path)?);
    }

    for path_str in ["device.toml", "config/device.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(DeviceConfig::load_from_file(&path)?);
        }
    }

    info!("No configuration file found, using compiled-in defaults");
    let config = DeviceConfig::default();
    config.validate()?;
    Ok(config)
}

async fn run_device(config: DeviceConfig) -> DeviceResult<()> {
    info!(client_id = %config.device.client_id, "Device starting");

    let link = HostLink::new(config.broker_endpoint()?);
    let session = MqttSession::new(&config)?;
    let actuator = build_actuator(&config.output);

    let mut device = Device::new(&config, link, session, actuator);

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = async {
            device.start().await;
            device.run_forever().await;
        } => {}
        _ = signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    device.shutdown().await;
    info!("Device stopped");
    Ok(())
}

fn handle_config_command(config: &DeviceConfig, show: bool) -> DeviceResult<()> {
    if show {
        let rendered = toml::to_string_pretty(&config.redacted())
            .map_err(|e| detector_led::DeviceError::internal_error(e.to_string()))?;
        println!("{rendered}");
    }

    info!("Configuration validation complete");
    Ok(())
}
