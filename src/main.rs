//! Command line entry point for dipcoat
//!
//! Provides:
//! - Serial port listing and device detection
//! - A monitor that logs every decoded line and state change
//! - One-shot operations (mode, home, jog, recipe, pause/resume, stop)
//!
//! # Usage
//!
//! ```bash
//! dipcoat ports
//! dipcoat monitor --port /dev/ttyACM0
//! dipcoat send home
//! dipcoat send move-z -- -400
//! dipcoat send recipe '{"cycles": 3, "dippingLength": 1200}'
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dipcoat::{
    detect_port, init_logging, list_ports, Axis, Config, ControllerEvent, DeviceController,
    DipCoaterController, RecipeParameters,
};
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "dipcoat", version = dipcoat::VERSION)]
#[command(about = "Serial controller for a two-axis dip coater", long_about = None)]
struct Cli {
    /// Configuration file (TOML or JSON); defaults to the platform config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured baud rate
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available serial ports
    Ports,

    /// Show which port discovery would pick
    Detect,

    /// Connect and log every event until Ctrl-C
    Monitor {
        /// Serial port; discovered when omitted
        #[arg(long)]
        port: Option<String>,
    },

    /// Connect, run one operation and disconnect
    Send {
        /// Serial port; discovered when omitted
        #[arg(long)]
        port: Option<String>,

        #[command(subcommand)]
        op: Operation,
    },
}

#[derive(Subcommand)]
enum Operation {
    /// Switch to manual mode
    Manual,
    /// Switch to automatic mode
    Automatic,
    /// Home both axes
    Home,
    /// Jog the Y axis by a signed number of steps
    MoveY {
        #[arg(allow_negative_numbers = true)]
        steps: f64,
    },
    /// Jog the Z axis by a signed number of steps
    MoveZ {
        #[arg(allow_negative_numbers = true)]
        steps: f64,
    },
    /// Emergency stop
    Stop,
    /// Pause the running recipe
    Pause,
    /// Resume a paused recipe
    Resume,
    /// Request and print the device status
    Status,
    /// Print the firmware version
    Version,
    /// Start a recipe; missing keys take their defaults
    Recipe {
        /// Recipe parameters as a JSON object
        json: String,
    },
    /// Send a raw line
    Raw { line: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json)?;

    tracing::debug!("dipcoat {} (built {})", dipcoat::VERSION, dipcoat::BUILD_DATE);

    match cli.command {
        Commands::Ports => print_ports(),
        Commands::Detect => print_detected(),
        Commands::Monitor { port } => {
            let config = load_config(cli.config, cli.baud)?;
            monitor(&config, port).await
        }
        Commands::Send { port, op } => {
            let config = load_config(cli.config, cli.baud)?;
            send(&config, port, op).await
        }
    }
}

fn load_config(path: Option<PathBuf>, baud: Option<u32>) -> Result<Config> {
    let mut config = Config::load_or_default(path.as_deref()).context("loading configuration")?;
    if let Some(baud) = baud {
        config.connection.baud_rate = baud;
        config.validate()?;
    }
    Ok(config)
}

fn print_ports() -> Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in &ports {
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => println!(
                "{}\t{:04x}:{:04x}\t{}",
                port.port_name, vid, pid, port.description
            ),
            _ => println!("{}\t-\t{}", port.port_name, port.description),
        }
    }
    Ok(())
}

fn print_detected() -> Result<()> {
    let ports = list_ports()?;
    match detect_port(&ports) {
        Some(port) => println!("{}", port.port_name),
        None => anyhow::bail!("no serial ports found"),
    }
    Ok(())
}

async fn connect(config: &Config, port: Option<String>) -> Result<DipCoaterController> {
    let controller = DipCoaterController::new(config.controller_config());
    let port = port.or_else(|| config.connection.port());
    controller
        .connect(port)
        .await
        .context("connecting to the dip coater")?;
    Ok(controller)
}

async fn monitor(config: &Config, port: Option<String>) -> Result<()> {
    let controller = DipCoaterController::new(config.controller_config());
    let mut events = controller.subscribe();
    controller
        .connect(port.or_else(|| config.connection.port()))
        .await
        .context("connecting to the dip coater")?;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            received = events.recv() => match received {
                Ok(ControllerEvent::Parsed(event)) => {
                    tracing::info!(kind = event.kind.tag(), "{}", event.raw);
                }
                Ok(event) => tracing::info!("{}", event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Monitor lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    controller.disconnect().await;
    Ok(())
}

async fn send(config: &Config, port: Option<String>, op: Operation) -> Result<()> {
    let controller = connect(config, port).await?;
    let result = run_operation(&controller, op).await;
    controller.disconnect().await;
    result
}

async fn run_operation(controller: &DipCoaterController, op: Operation) -> Result<()> {
    match op {
        Operation::Manual => controller.set_mode_manual().await?,
        Operation::Automatic => controller.set_mode_automatic().await?,
        Operation::Home => controller.execute_home().await?,
        Operation::MoveY { steps } => controller.move_axis(Axis::Y, steps).await?,
        Operation::MoveZ { steps } => controller.move_axis(Axis::Z, steps).await?,
        Operation::Stop => controller.emergency_stop().await?,
        Operation::Pause => controller.pause_process().await?,
        Operation::Resume => controller.resume_process().await?,
        Operation::Status => {
            controller.request_status().await?;
            let snapshot = controller.get_state();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Operation::Version => {
            let reply = controller.request_version().await?;
            println!("{}", reply.raw);
        }
        Operation::Recipe { json } => {
            let overrides: serde_json::Value =
                serde_json::from_str(&json).context("recipe is not valid JSON")?;
            let params = RecipeParameters::merged(&overrides)?;
            controller.start_recipe(params).await?;
        }
        Operation::Raw { line } => controller.send_raw(&line).await?,
    }
    Ok(())
}
