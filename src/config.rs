//! MQTT settings read from the LCU's `config.ini`
//!
//! Only the `[MQTT]` section is consumed:
//! ```ini
//! [MQTT]
//! MQTT_BROKER_IP = 169.254.214.100
//! MQTT_BROKER_PORT = 1883
//! MQTT_TOPIC_HEARTBEAT = server/heartbeat
//! MQTT_TOPIC_TELEMETRY = server/telemetry
//! MQTT_TOPIC_ACK = lcu/ack
//! ```
//! `MQTT_TOPIC_ACK` is optional; the other four keys are required.

use ini::{Ini, Properties};
use lcu_shared::protocol;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config.ini";

/// Client id the WCS monitor connects with
pub const DEFAULT_CLIENT_ID: &str = "WCS_TEST_CLIENT";

const SECTION: &str = "MQTT";
const KEY_BROKER_IP: &str = "MQTT_BROKER_IP";
const KEY_BROKER_PORT: &str = "MQTT_BROKER_PORT";
const KEY_TOPIC_HEARTBEAT: &str = "MQTT_TOPIC_HEARTBEAT";
const KEY_TOPIC_TELEMETRY: &str = "MQTT_TOPIC_TELEMETRY";
const KEY_TOPIC_ACK: &str = "MQTT_TOPIC_ACK";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] ini::ParseError),

    #[error("Missing section [{0}]")]
    MissingSection(&'static str),

    #[error("Missing key {key} in [{section}]")]
    MissingKey {
        section: &'static str,
        key: &'static str,
    },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Topics the monitor subscribes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttTopics {
    pub heartbeat: String,
    pub telemetry: String,
    pub ack: String,
}

impl MqttTopics {
    pub fn all(&self) -> [&str; 3] {
        [&self.heartbeat, &self.telemetry, &self.ack]
    }
}

/// Broker connection settings, built once at start-up
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_ip: String,
    pub broker_port: u16,
    pub client_id: String,
    /// MQTT keep-alive interval
    pub keep_alive: Duration,
    pub topics: MqttTopics,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_ip: "169.254.214.100".into(),
            broker_port: 1883,
            client_id: DEFAULT_CLIENT_ID.into(),
            keep_alive: Duration::from_secs(30),
            topics: MqttTopics {
                heartbeat: "server/heartbeat".into(),
                telemetry: "server/telemetry".into(),
                ack: protocol::ACK_TOPIC.into(),
            },
        }
    }
}

impl MqttConfig {
    /// Load from an INI file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Parse from INI text
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text)?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let section = ini
            .section(Some(SECTION))
            .ok_or(ConfigError::MissingSection(SECTION))?;

        let port_text = required(section, KEY_BROKER_PORT)?;
        let broker_port = port_text
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue {
                key: KEY_BROKER_PORT,
                value: port_text.into(),
            })?;

        Ok(Self {
            broker_ip: required(section, KEY_BROKER_IP)?.into(),
            broker_port,
            topics: MqttTopics {
                heartbeat: required(section, KEY_TOPIC_HEARTBEAT)?.into(),
                telemetry: required(section, KEY_TOPIC_TELEMETRY)?.into(),
                ack: section
                    .get(KEY_TOPIC_ACK)
                    .filter(|topic| !topic.is_empty())
                    .unwrap_or(protocol::ACK_TOPIC)
                    .into(),
            },
            ..Default::default()
        })
    }

    /// Replace the client id
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// `host:port` of the broker, for display
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.broker_ip, self.broker_port)
    }
}

fn required<'a>(section: &'a Properties, key: &'static str) -> Result<&'a str, ConfigError> {
    match section.get(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingKey {
            section: SECTION,
            key,
        }),
    }
}
