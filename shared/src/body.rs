//! Typed command bodies
//!
//! The envelope keeps `body` as an open JSON object; these types build (and
//! read back) the bodies of the commands the WCS actually sends.

use serde::{Deserialize, Serialize};

use crate::command::CommandKind;

/// A body type bound to one command name
pub trait CommandBody: Serialize {
    const KIND: CommandKind;
}

/// Axis selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Axis {
    Pan,
    Tilt,
    Both,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::Pan => write!(f, "PAN"),
            Axis::Tilt => write!(f, "TILT"),
            Axis::Both => write!(f, "BOTH"),
        }
    }
}

/// Jog direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Fwd,
    Rev,
}

/// Jog control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JogMode {
    /// Velocity in degrees per second
    #[default]
    #[serde(rename = "VELOCITY_DEG")]
    VelocityDeg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnableDrive {
    pub axis: Axis,
}

impl EnableDrive {
    pub fn new(axis: Axis) -> Self {
        Self { axis }
    }
}

impl CommandBody for EnableDrive {
    const KIND: CommandKind = CommandKind::EnableDrive;
}

/// Continuous velocity jog
///
/// Every frame re-specifies the full target; the LCU treats the latest one as
/// authoritative, so the command must be re-sent to stay in effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jog {
    pub axis: Axis,
    pub mode: JogMode,
    pub direction: Direction,
    pub velocity: f64,
    pub accel: f64,
    pub decel: f64,
    pub enable: bool,
}

impl Jog {
    /// Create an enabled velocity jog
    pub fn new(axis: Axis, direction: Direction, velocity: f64, accel: f64, decel: f64) -> Self {
        Self {
            axis,
            mode: JogMode::VelocityDeg,
            direction,
            velocity,
            accel,
            decel,
            enable: true,
        }
    }

    /// The stop command matching this jog
    pub fn stop(&self) -> JogStop {
        JogStop::new(self.axis)
    }
}

impl CommandBody for Jog {
    const KIND: CommandKind = CommandKind::Jog;
}

/// `Jog` with `enable: false`, the safe-stop form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JogStop {
    pub axis: Axis,
    enable: bool,
}

impl JogStop {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            enable: false,
        }
    }
}

impl CommandBody for JogStop {
    const KIND: CommandKind = CommandKind::Jog;
}

/// Absolute position move in degrees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveToPositionDeg {
    pub axis: Axis,
    pub target_deg: f64,
    pub velocity: f64,
    pub accel: f64,
    pub decel: f64,
}

impl CommandBody for MoveToPositionDeg {
    const KIND: CommandKind = CommandKind::MoveToPositionDeg;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_wire_names() {
        assert_eq!(serde_json::to_string(&Axis::Pan).unwrap(), r#""PAN""#);
        assert_eq!(serde_json::to_string(&Axis::Both).unwrap(), r#""BOTH""#);
        let tilt: Axis = serde_json::from_str(r#""TILT""#).unwrap();
        assert_eq!(tilt, Axis::Tilt);
        assert_eq!(Axis::Tilt.to_string(), "TILT");
    }

    #[test]
    fn test_jog_defaults() {
        let jog = Jog::new(Axis::Pan, Direction::default(), 50.0, 40.0, 30.0);
        assert!(jog.enable);
        assert_eq!(jog.mode, JogMode::VelocityDeg);
        assert_eq!(jog.direction, Direction::Fwd);
        assert_eq!(jog.stop(), JogStop::new(Axis::Pan));
    }

    #[test]
    fn test_stop_never_enables() {
        let stop: JogStop = serde_json::from_str(r#"{"axis":"PAN","enable":false}"#).unwrap();
        assert_eq!(stop, JogStop::new(Axis::Pan));
        assert_eq!(
            serde_json::to_string(&JogStop::new(Axis::Tilt)).unwrap(),
            r#"{"axis":"TILT","enable":false}"#
        );
    }

    #[test]
    fn test_move_to_position_fields() {
        let body = MoveToPositionDeg {
            axis: Axis::Pan,
            target_deg: 45.0,
            velocity: 20.0,
            accel: 10.0,
            decel: 10.0,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"axis":"PAN","target_deg":45.0,"velocity":20.0,"accel":10.0,"decel":10.0}"#
        );
        assert_eq!(MoveToPositionDeg::KIND.as_str(), "MoveToPositionDeg");
    }
}
