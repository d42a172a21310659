//! Command handling on the LCU side
//!
//! This module handles:
//! - Validating the command envelope
//! - Mapping command names onto known command kinds
//! - Publishing replies on the ack topic
//! - Publishing the periodic heartbeat

mod ack;
mod parser;

pub use ack::{AckConfig, AckPublisher, HEARTBEAT_PERIOD};
pub use parser::parse_command;
