use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hexapod_zenoh_runtime::clock::SystemClock;
use hexapod_zenoh_runtime::config::RobotConfig;
use hexapod_zenoh_runtime::motor::{self, ActuatorDriver, ServoDriver, SimulatedDriver};
use hexapod_zenoh_runtime::sequencer::{Rig, Sequencer};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "hexapod")]
#[command(about = "Gait runtime for a six-legged robot", long_about = None)]
#[command(version)]
struct Cli {
    /// Robot configuration file (JSON); the stock robot when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log servo writes instead of driving hardware
    #[arg(long, global = true)]
    simulate: bool,

    /// Serial port of the servo bus
    #[arg(long, global = true)]
    port: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve gait commands over zenoh (default)
    Run,
    /// Step one servo through its range, one second per step
    Sweep {
        #[arg(long)]
        channel: u8,
    },
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    if let Err(e) = start(cli).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn start(cli: Cli) -> Result<(), BoxError> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            RobotConfig::load(path)?
        }
        None => RobotConfig::default(),
    };
    if cli.simulate {
        config.driver.enabled = false;
    }
    if let Some(port) = cli.port {
        config.driver.port = port;
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let driver = open_driver(&config, config.channels())?;
            let rig = Rig::assemble(&config, driver, Box::new(SystemClock::new()))?;
            let sequencer = Sequencer::new(rig, tokio::runtime::Handle::current());
            hexapod_zenoh_runtime::runtime::run(sequencer).await
        }
        Command::Sweep { channel } => {
            let mut driver = open_driver(&config, vec![channel])?;
            motor::sweep(driver.as_mut(), channel, Duration::from_secs(1)).await?;
            Ok(())
        }
    }
}

fn open_driver(config: &RobotConfig, channels: Vec<u8>) -> Result<Box<dyn ActuatorDriver>, BoxError> {
    if !config.driver.enabled {
        info!("Servo driver disabled, simulating {} channels", channels.len());
        return Ok(Box::new(SimulatedDriver::new()));
    }
    let mut driver = ServoDriver::new(&config.driver.port, config.driver.baudrate, channels)?;
    driver.initialize()?;
    Ok(Box::new(driver))
}
