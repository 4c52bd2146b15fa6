use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use dualdrive::config::Config;
use dualdrive::controller::EvdevStream;
use dualdrive::orchestrator::{interrupt_channel, Orchestrator, Sinks};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Drive a rover from a DualShock controller
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file, defaults to the per-user config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Event device, overrides `device.path`
    #[arg(short, long)]
    device: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;
    let args = Args::parse();

    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(device) = args.device {
        config.device.path = device;
    }
    config.validate()?;
    info!("Using event device {}", config.device.path.display());

    let stream = EvdevStream::open(
        &config.device.path,
        config.device.layout,
        Duration::from_millis(config.device.poll_timeout_ms),
    )
    .map_err(|e| eyre!("Failed to open controller: {}", e))?;

    let interrupts = interrupt_channel();
    let orchestrator = Orchestrator::new(&config, Box::new(stream), Sinks::tracing());
    let reason = orchestrator.run(interrupts).await?;

    info!("Rover stopped: {}", reason);
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
