//! Command link to the LCU
//!
//! This module handles:
//! - Framing and writing commands to the TCP stream
//! - The enable / jog / stop command sequence

mod jog;
mod sender;

pub use jog::{run_session, JogPlan};
pub use sender::CommandSender;
