//! Status monitor - prints everything the LCU publishes

use crate::config::MqttConfig;
use anyhow::{Context, Result};
use bytes::Bytes;
use lcu_shared::Reply;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, Publish, QoS,
};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Shown instead of payloads that are not valid UTF-8
pub const BINARY_PLACEHOLDER: &str = "<binary>";

/// Pause after a connection error before polling again
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Bound on flushing the DISCONNECT packet at shutdown
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Payload as text, or the binary placeholder
pub fn render_payload(payload: &[u8]) -> &str {
    std::str::from_utf8(payload).unwrap_or(BINARY_PLACEHOLDER)
}

/// A message received on one of the monitored topics
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub topic: String,
    pub qos: QoS,
    pub payload: Bytes,
}

impl ReceivedMessage {
    pub fn payload_text(&self) -> &str {
        render_payload(&self.payload)
    }
}

impl From<&Publish> for ReceivedMessage {
    fn from(publish: &Publish) -> Self {
        Self {
            topic: publish.topic.clone(),
            qos: publish.qos,
            payload: publish.payload.clone(),
        }
    }
}

impl fmt::Display for ReceivedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[WCS] Message received")?;
        writeln!(f, " Topic   : {}", self.topic)?;
        writeln!(f, " QoS     : {}", self.qos as u8)?;
        write!(f, " Payload : {}", self.payload_text())
    }
}

/// MQTT subscriber for the heartbeat, telemetry and ack topics
pub struct StatusMonitor {
    config: MqttConfig,
    client: AsyncClient,
    eventloop: EventLoop,
    received: u64,
}

impl StatusMonitor {
    /// Create the client; nothing touches the network until [`run`](Self::run)
    pub fn new(config: MqttConfig) -> Self {
        let mut opts = MqttOptions::new(&config.client_id, &config.broker_ip, config.broker_port);
        opts.set_keep_alive(config.keep_alive);
        opts.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(opts, 10);

        Self {
            config,
            client,
            eventloop,
            received: 0,
        }
    }

    /// Print messages until `shutdown` resolves, returning the message count
    pub async fn run<F>(mut self, shutdown: F) -> Result<u64>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("[WCS] Connecting to broker {}...", self.config.broker_addr());

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("[WCS] Exiting...");
                    self.disconnect().await;
                    break;
                }
                event = self.eventloop.poll() => match event {
                    Ok(event) => {
                        if let Some(message) = self.handle_event(event)? {
                            println!("\n{message}");
                        }
                    }
                    Err(e) => {
                        warn!("[WCS] Disconnected from broker, reason: {}", e);
                        sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        Ok(self.received)
    }

    /// React to one event-loop event, returning any message to print
    pub fn handle_event(&mut self, event: Event) -> Result<Option<ReceivedMessage>> {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => {
                if ack.code == ConnectReturnCode::Success {
                    info!("[WCS] Connected to MQTT broker");
                    // Clean session: subscriptions must be renewed on every connect
                    self.subscribe()?;
                } else {
                    warn!("[WCS] Connection failed, reason: {:?}", ack.code);
                }
                Ok(None)
            }
            Event::Incoming(Packet::SubAck(ack)) => {
                debug!("[WCS] SubAck pkid={} codes={:?}", ack.pkid, ack.return_codes);
                Ok(None)
            }
            Event::Incoming(Packet::Disconnect) => {
                warn!("[WCS] Broker sent DISCONNECT");
                Ok(None)
            }
            Event::Incoming(Packet::Publish(publish)) => {
                self.received += 1;
                let message = ReceivedMessage::from(&publish);
                if message.topic == self.config.topics.ack {
                    log_reply(&message.payload);
                }
                Ok(Some(message))
            }
            _ => Ok(None),
        }
    }

    /// Queue the subscriptions without waiting on the request channel
    ///
    /// Runs on the task that polls the event loop, so an awaiting send on a
    /// full channel would never complete.
    fn subscribe(&self) -> Result<()> {
        for topic in self.config.topics.all() {
            self.client
                .try_subscribe(topic, QoS::AtLeastOnce)
                .with_context(|| format!("subscribe failed for '{}'", topic))?;
        }

        info!("[WCS] Subscribed to:");
        for topic in self.config.topics.all() {
            info!("      {}", topic);
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.client.try_disconnect() {
            debug!("[WCS] Disconnect request not queued: {}", e);
            return;
        }

        // Drive the event loop until the DISCONNECT packet has gone out
        let flushed = timeout(DISCONNECT_TIMEOUT, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;

        if flushed.is_err() {
            debug!("[WCS] Disconnect not flushed within {:?}", DISCONNECT_TIMEOUT);
        }
    }
}

fn log_reply(payload: &[u8]) {
    match Reply::from_slice(payload) {
        Ok(reply) => {
            let result = &reply.body.result;
            if result.ok {
                info!("[WCS] Reply {} ({}): {} {}", reply.id, reply.name, result.code, result.message);
            } else {
                warn!("[WCS] Reply {} ({}): {} {}", reply.id, reply.name, result.code, result.message);
            }
        }
        Err(e) => debug!("[WCS] Ack payload is not a reply: {}", e),
    }
}
