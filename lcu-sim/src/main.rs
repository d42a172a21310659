mod command;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use command::{AckConfig, AckPublisher, HEARTBEAT_PERIOD};
use lcu_shared::protocol;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Bench LCU: accepts WCS commands and acknowledges them over MQTT
#[derive(Parser, Debug)]
#[command(name = "lcu-sim", version)]
struct Args {
    /// Address to accept the WCS on
    #[arg(long, env = "LCU_BIND", default_value_t = format!("0.0.0.0:{}", protocol::DEFAULT_LCU_PORT))]
    bind: String,

    /// MQTT broker for replies; without it commands are only logged
    #[arg(long, env = "MQTT_BROKER_IP")]
    broker_ip: Option<String>,

    #[arg(long, env = "MQTT_BROKER_PORT", default_value_t = 1883)]
    broker_port: u16,

    #[arg(long, default_value = "LCU_SIM")]
    client_id: String,

    #[arg(long, default_value = protocol::ACK_TOPIC)]
    ack_topic: String,

    /// Topic for a retained "offline" last will
    #[arg(long)]
    will_topic: Option<String>,

    /// Topic for the periodic heartbeat event; none is sent without it
    #[arg(long, env = "MQTT_TOPIC_HEARTBEAT")]
    heartbeat_topic: Option<String>,

    /// Heartbeat period in milliseconds
    #[arg(
        long,
        default_value_t = HEARTBEAT_PERIOD.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    heartbeat_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();

    let acks = args.broker_ip.map(|broker_ip| {
        let publisher = AckPublisher::start(AckConfig {
            broker_ip,
            broker_port: args.broker_port,
            client_id: args.client_id,
            ack_topic: args.ack_topic,
            will_topic: args.will_topic,
            heartbeat_topic: args.heartbeat_topic,
            heartbeat_period: Duration::from_millis(args.heartbeat_ms),
        });
        info!("[LCU] Replies go to {}", publisher.topic());
        publisher
    });

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!("[LCU] Listening on {}", args.bind);

    tokio::select! {
        result = accept_loop(&listener, acks.as_ref()) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("[LCU] Shutting down");
            Ok(())
        }
    }
}

/// Serve WCS connections one after another
async fn accept_loop(listener: &TcpListener, acks: Option<&AckPublisher>) -> Result<()> {
    loop {
        let (socket, addr) = listener.accept().await?;
        info!("[LCU] WCS connected from {}", addr);

        let summary = session::serve(socket, addr.to_string(), acks).await;
        info!(
            "[LCU] Session {}: {} commands, {} rejected",
            addr, summary.accepted, summary.rejected
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["lcu-sim"]).unwrap();
        assert_eq!(args.ack_topic, "lcu/ack");
        assert!(args.will_topic.is_none());
        assert_eq!(args.heartbeat_ms, 1000);
    }
}
