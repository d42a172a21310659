mod command;
mod config;
mod mqtt;
mod transport;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use command::{run_session, CommandSender, JogPlan};
use config::{MqttConfig, DEFAULT_CLIENT_ID, DEFAULT_CONFIG_PATH};
use lcu_shared::{protocol, timing, Axis, Direction, Jog};
use mqtt::StatusMonitor;
use std::path::PathBuf;
use std::time::Duration;
use transport::{TcpConnector, DEFAULT_CONNECT_TIMEOUT};

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// WCS bench tools for the LCU
#[derive(Parser, Debug)]
#[command(name = "wcs", version)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Enable an axis and jog it until Ctrl-C, then stop it
    Jog(JogArgs),
    /// Print heartbeat, telemetry and ack messages from the LCU
    Monitor(MonitorArgs),
}

#[derive(Args, Debug)]
struct JogArgs {
    /// LCU command port
    #[arg(long, env = "LCU_ADDR", default_value_t = format!("127.0.0.1:{}", protocol::DEFAULT_LCU_PORT))]
    lcu: String,

    #[arg(long, value_enum, default_value_t = AxisArg::Pan)]
    axis: AxisArg,

    #[arg(long, value_enum, default_value_t = DirectionArg::Fwd)]
    direction: DirectionArg,

    /// deg/s
    #[arg(long, default_value_t = 50.0)]
    velocity: f64,

    /// deg/s^2
    #[arg(long, default_value_t = 40.0)]
    accel: f64,

    /// deg/s^2
    #[arg(long, default_value_t = 30.0)]
    decel: f64,

    /// Jog re-send period in milliseconds
    #[arg(long, default_value_t = timing::JOG_PERIOD_MS, value_parser = clap::value_parser!(u64).range(1..))]
    period_ms: u64,

    /// Pause after EnableDrive in milliseconds
    #[arg(long, default_value_t = timing::ENABLE_SETTLE_MS)]
    settle_ms: u64,

    /// Bound on the final stop write in milliseconds
    #[arg(long, default_value_t = timing::STOP_TIMEOUT_MS)]
    stop_timeout_ms: u64,

    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_millis() as u64)]
    connect_timeout_ms: u64,
}

#[derive(Args, Debug)]
struct MonitorArgs {
    /// INI file with an [MQTT] section
    #[arg(long, env = "WCS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[arg(long, env = "MQTT_CLIENT_ID", default_value = DEFAULT_CLIENT_ID)]
    client_id: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AxisArg {
    Pan,
    Tilt,
    Both,
}

impl From<AxisArg> for Axis {
    fn from(arg: AxisArg) -> Self {
        match arg {
            AxisArg::Pan => Axis::Pan,
            AxisArg::Tilt => Axis::Tilt,
            AxisArg::Both => Axis::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    Fwd,
    Rev,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Fwd => Direction::Fwd,
            DirectionArg::Rev => Direction::Rev,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Jog(args) => jog(args).await,
        Mode::Monitor(args) => monitor(args).await,
    }
}

async fn jog(args: JogArgs) -> Result<()> {
    let jog = Jog::new(
        args.axis.into(),
        args.direction.into(),
        args.velocity,
        args.accel,
        args.decel,
    );
    let plan = JogPlan::new(&jog)?
        .with_period(Duration::from_millis(args.period_ms))
        .with_settle(Duration::from_millis(args.settle_ms))
        .with_stop_timeout(Duration::from_millis(args.stop_timeout_ms));

    let connector = TcpConnector::new(args.lcu)
        .with_connect_timeout(Duration::from_millis(args.connect_timeout_ms));
    let stream = connector.connect().await?;
    info!("[WCS] Connected to LCU at {}", connector.address());

    let report = run_session(CommandSender::new(stream), &plan, shutdown_signal()).await?;
    info!(
        "[WCS] Session ended: {} jog frames, stop {}",
        report.jog_frames,
        if report.stop_sent { "sent" } else { "not sent" }
    );
    Ok(())
}

async fn monitor(args: MonitorArgs) -> Result<()> {
    let config = MqttConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?
        .with_client_id(args.client_id);

    let received = StatusMonitor::new(config).run(shutdown_signal()).await?;
    info!("[WCS] {} messages received", received);
    Ok(())
}

/// Resolves on Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
