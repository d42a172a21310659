//! LCU Shared Protocol Types
//!
//! This crate provides the command envelope, typed command bodies and the
//! length-prefixed codec used on the TCP link between the WCS (supervisory
//! node) and the LCU (axis control unit).

pub mod body;
pub mod codec;
pub mod command;
pub mod reply;

pub use body::{
    Axis, CommandBody, Direction, EnableDrive, Jog, JogMode, JogStop,
    MoveToPositionDeg,
};
pub use command::{Command, CommandKind, Fields};
pub use reply::{Reply, ReplyBody, ReplyResult};

/// Literal envelope values shared by both ends of the link
pub mod protocol {
    /// Protocol version carried in the `v` field
    pub const VERSION: u32 = 1;

    /// `type` of every frame the WCS sends
    pub const COMMAND_TYPE: &str = "Command";

    /// `type` of every acknowledgement the LCU publishes
    pub const REPLY_TYPE: &str = "Reply";

    /// Originator tag for commands built by the WCS
    pub const WCS_SOURCE: &str = "wcs";

    /// Originator tag for replies built by the LCU
    pub const LCU_SOURCE: &str = "lcu";

    /// MQTT topic the LCU publishes command replies on
    pub const ACK_TOPIC: &str = "lcu/ack";

    /// TCP port the LCU listens on for WCS commands
    pub const DEFAULT_LCU_PORT: u16 = 6001;
}

/// Timing of the jog command sequence
pub mod timing {
    /// Pause after `EnableDrive` so the axis can reach the enabled state
    pub const ENABLE_SETTLE_MS: u64 = 200;

    /// Period of the repeated `Jog` command (10 Hz)
    pub const JOG_PERIOD_MS: u64 = 100;

    /// Upper bound on the final stop write during shutdown
    pub const STOP_TIMEOUT_MS: u64 = 1000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jog_period_is_10hz() {
        assert_eq!(1000 / timing::JOG_PERIOD_MS, 10);
        assert!(timing::ENABLE_SETTLE_MS >= 200);
    }

    #[test]
    fn test_envelope_literals() {
        assert_eq!(protocol::VERSION, 1);
        assert_eq!(protocol::COMMAND_TYPE, "Command");
        assert_eq!(protocol::ACK_TOPIC, "lcu/ack");
    }
}
