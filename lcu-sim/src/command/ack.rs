//! Reply and heartbeat publishing over MQTT

use anyhow::Result;
use lcu_shared::{protocol, Reply};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, LastWill, MqttOptions, Packet, QoS};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Default heartbeat period
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);

/// Compact heartbeat event
pub fn heartbeat_payload() -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&json!({
        "v": protocol::VERSION,
        "id": "heartbeat",
        "type": "Event",
        "name": "Heartbeat",
        "src": "middleware",
        "body": { "status": "alive" },
        "meta": {},
    }))
}

/// Broker settings for reply publishing
#[derive(Debug, Clone)]
pub struct AckConfig {
    pub broker_ip: String,
    pub broker_port: u16,
    pub client_id: String,
    pub ack_topic: String,
    /// Topic that receives a retained "offline" if the simulator drops off
    pub will_topic: Option<String>,
    /// Publish a heartbeat here every `heartbeat_period`
    pub heartbeat_topic: Option<String>,
    pub heartbeat_period: Duration,
}

/// Publishes command replies; the MQTT event loop runs on its own task
pub struct AckPublisher {
    client: AsyncClient,
    topic: String,
    driver: JoinHandle<()>,
    heartbeat: Option<JoinHandle<()>>,
}

impl AckPublisher {
    pub fn start(config: AckConfig) -> Self {
        let mut opts = MqttOptions::new(config.client_id, config.broker_ip, config.broker_port);
        opts.set_keep_alive(Duration::from_secs(20));
        opts.set_clean_session(true);
        if let Some(topic) = config.will_topic {
            opts.set_last_will(LastWill::new(topic, "offline", QoS::AtLeastOnce, true));
        }

        let (client, mut eventloop) = AsyncClient::new(opts, 50);
        let connected = Arc::new(AtomicBool::new(false));

        let link = connected.clone();
        let driver = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        link.store(ack.code == ConnectReturnCode::Success, Ordering::Relaxed);
                        debug!("[MQTT] ConnAck {:?}", ack.code);
                    }
                    Ok(event) => debug!("[MQTT] {:?}", event),
                    Err(e) => {
                        link.store(false, Ordering::Relaxed);
                        warn!("[MQTT] poll error: {} (retrying)", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        let heartbeat = config.heartbeat_topic.map(|topic| {
            tokio::spawn(heartbeat_loop(
                client.clone(),
                topic,
                config.heartbeat_period,
                connected,
            ))
        });

        Self {
            client,
            topic: config.ack_topic,
            driver,
            heartbeat,
        }
    }

    /// Queue a reply for publishing with QoS 1
    pub async fn publish(&self, reply: &Reply) -> Result<()> {
        let payload = reply.to_vec()?;
        self.client
            .publish(&self.topic, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for AckPublisher {
    fn drop(&mut self) {
        self.driver.abort();
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.abort();
        }
    }
}

/// Publish a heartbeat every `period` (QoS 1) while the broker link is up
///
/// Beats are skipped, never queued, while disconnected so they cannot crowd
/// replies out of the request channel.
async fn heartbeat_loop(
    client: AsyncClient,
    topic: String,
    period: Duration,
    connected: Arc<AtomicBool>,
) {
    let payload = match heartbeat_payload() {
        Ok(payload) => payload,
        Err(e) => {
            warn!("[MQTT] Heartbeat payload not built: {}", e);
            return;
        }
    };

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if !connected.load(Ordering::Relaxed) {
            continue;
        }
        if let Err(e) = client.try_publish(&topic, QoS::AtLeastOnce, false, payload.clone()) {
            debug!("[MQTT] Heartbeat skipped: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcu_shared::{Axis, Command, EnableDrive};

    #[tokio::test]
    async fn test_publish_queues_without_broker() {
        // Nothing listens here; publish only enqueues
        let publisher = AckPublisher::start(AckConfig {
            broker_ip: "127.0.0.1".into(),
            broker_port: 1,
            client_id: "lcu-sim-test".into(),
            ack_topic: "lcu/ack".into(),
            will_topic: Some("server/telemetry".into()),
            heartbeat_topic: None,
            heartbeat_period: HEARTBEAT_PERIOD,
        });
        assert_eq!(publisher.topic(), "lcu/ack");

        let cmd = Command::from_body("CMD_001", &EnableDrive::new(Axis::Pan)).unwrap();
        publisher.publish(&Reply::executed(&cmd)).await.unwrap();
    }

    #[test]
    fn test_heartbeat_payload() {
        let payload = heartbeat_payload().unwrap();
        assert_eq!(
            std::str::from_utf8(&payload).unwrap(),
            r#"{"v":1,"id":"heartbeat","type":"Event","name":"Heartbeat","src":"middleware","body":{"status":"alive"},"meta":{}}"#
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_loop_publishes_while_connected() {
        let opts = MqttOptions::new("lcu-sim-test", "127.0.0.1", 1);
        // Event loop never polled, so queued requests stay in the channel
        let (client, _eventloop) = AsyncClient::new(opts, 10);

        let connected = Arc::new(AtomicBool::new(true));
        let heartbeat = tokio::spawn(heartbeat_loop(
            client.clone(),
            "server/heartbeat".into(),
            Duration::from_millis(100),
            connected.clone(),
        ));

        // Ticks at 0, 100 and 200 ms; the link drops before the 300 ms tick
        tokio::time::sleep(Duration::from_millis(250)).await;
        connected.store(false, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(300)).await;
        heartbeat.abort();

        let mut free = 0;
        while client
            .try_publish("test/fill", QoS::AtMostOnce, false, Vec::<u8>::new())
            .is_ok()
        {
            free += 1;
        }
        assert_eq!(free, 10 - 3);
    }
}
