//! CLI for SolarLink
//!
//! Subcommands:
//! - `monitor`: stream readings and connection status until Ctrl-C
//! - `control`: change the tracker mode or command an angle
//! - `emergency`: trigger an emergency stop
//! - `plant`: push plant requirements

use std::time::Duration;

use clap::{Parser, Subcommand};
use solarlink::auth::AuthSession;
use solarlink::channel::{ChannelConfig, ChannelStatus};
use solarlink::config::{Settings, load_config, load_config_from};
use solarlink::telemetry::{Dashboard, FrostProtection, PlantRequirements, TrackerMode};
use solarlink::transport::WebSocketTransport;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "solarlink", version, about = "Solar tracker telemetry client")]
struct Cli {
    /// Configuration file, without extension (default: config/default)
    #[arg(long, global = true)]
    config: Option<String>,
    /// Broker endpoint, overrides the configured one
    #[arg(long, global = true)]
    endpoint: Option<String>,
    /// Bearer token sent with CONNECT
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print readings and status changes until Ctrl-C
    Monitor,
    /// Change the tracker mode; `--angle` commands a manual angle
    Control {
        #[arg(long)]
        mode: TrackerMode,
        #[arg(long)]
        angle: Option<f64>,
    },
    /// Put the tracker into safety mode immediately
    Emergency,
    /// Push operator plant requirements
    Plant {
        #[arg(long)]
        sun_rays: Option<String>,
        #[arg(long)]
        shading: Option<u8>,
        #[arg(long)]
        frost: Option<FrostProtection>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };
    solarlink::utils::logging::init(&settings.logging.level);

    if let Err(e) = run(cli, settings).await {
        error!("solarlink failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mut settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(endpoint) = cli.endpoint {
        settings.channel.endpoint = endpoint;
    }
    let mut config = ChannelConfig::from_settings(&settings.channel)?;
    if let Some(token) = cli.token {
        config = config.with_auth(AuthSession::new(token, "USER"));
    }
    let connect_timeout = config.connect_timeout;

    let dashboard = Dashboard::start(config, settings.dashboard, WebSocketTransport::new())?;

    match cli.command {
        Command::Monitor => monitor(&dashboard).await,
        Command::Control { mode, angle } => {
            wait_connected(&dashboard, connect_timeout).await?;
            match angle {
                Some(angle) if mode == TrackerMode::Manual => dashboard.set_target_angle(angle)?,
                Some(_) => return Err("--angle needs --mode manual".into()),
                None => dashboard.set_mode(mode)?,
            }
            finish(&dashboard).await
        }
        Command::Emergency => {
            wait_connected(&dashboard, connect_timeout).await?;
            dashboard.emergency_stop()?;
            finish(&dashboard).await
        }
        Command::Plant {
            sun_rays,
            shading,
            frost,
        } => {
            let requirements = PlantRequirements {
                sun_rays,
                shading,
                night_frost_protection: frost,
            };
            requirements.validate()?;
            wait_connected(&dashboard, connect_timeout).await?;
            dashboard.push_plant_requirements(&requirements)?;
            finish(&dashboard).await
        }
    }
}

async fn wait_connected(
    dashboard: &Dashboard,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let channel = dashboard.channel();
    let waited = tokio::time::timeout(timeout, channel.wait_for(ChannelStatus::Connected)).await;
    match waited {
        Ok(state) if state.is_connected() => Ok(()),
        _ => {
            let reason = channel
                .last_error()
                .unwrap_or_else(|| "no answer from broker".to_string());
            Err(format!("could not connect to {}: {reason}", channel.config().endpoint).into())
        }
    }
}

async fn finish(dashboard: &Dashboard) -> Result<(), Box<dyn std::error::Error>> {
    dashboard.flush().await?;
    info!("command delivered");
    dashboard.stop();
    Ok(())
}

async fn monitor(dashboard: &Dashboard) -> Result<(), Box<dyn std::error::Error>> {
    let mut readings = dashboard.readings();
    let mut status = dashboard.channel().watch();

    loop {
        tokio::select! {
            changed = readings.changed() => {
                if changed.is_err() {
                    break;
                }
                let reading = readings.borrow_and_update().clone();
                println!("{}", serde_json::to_string(&reading)?);
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = status.borrow_and_update().clone();
                match state.error {
                    Some(ref error) => println!("Status: {} ({error})", state.label()),
                    None => println!("Status: {}", state.label()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received. Exiting gracefully.");
                break;
            }
        }
    }

    let snapshot = dashboard.snapshot();
    for alert in snapshot.alerts() {
        println!("{} {}", alert.at.format("%H:%M:%S"), alert.message);
    }
    dashboard.stop();
    Ok(())
}
