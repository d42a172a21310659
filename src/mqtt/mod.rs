//! MQTT side-channel
//!
//! The LCU publishes heartbeat, telemetry and command replies over MQTT.
//! Nothing here is correlated with the TCP command link.

mod monitor;

pub use monitor::StatusMonitor;
