//! Command envelope parsing

use lcu_shared::{protocol, Command, CommandKind};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ParseError {
    /// Not JSON, or a required envelope field is missing or mistyped
    #[error("invalid envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("unknown command name {0:?}")]
    UnknownCommand(String),
}

/// Body fields the drive layer consumes
///
/// Fields of the wrong JSON type are treated as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionFields {
    pub axis: Option<String>,
    pub target_deg: Option<f64>,
    pub target_pos: Option<f64>,
    pub velocity: Option<f64>,
    pub accel: Option<f64>,
    pub decel: Option<f64>,
    pub direction: Option<String>,
    pub enable: Option<bool>,
}

impl MotionFields {
    fn from_command(command: &Command) -> Self {
        let text = |key: &str| command.body_field(key).and_then(Value::as_str).map(String::from);
        let number = |key: &str| command.body_field(key).and_then(Value::as_f64);

        Self {
            axis: text("axis"),
            target_deg: number("target_deg"),
            target_pos: number("target_pos"),
            velocity: number("velocity"),
            accel: number("accel"),
            decel: number("decel"),
            direction: text("direction"),
            enable: command.body_field("enable").and_then(Value::as_bool),
        }
    }
}

/// A command that passed envelope validation
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    pub command: Command,
    pub kind: CommandKind,
    pub fields: MotionFields,
}

impl ParsedCommand {
    /// Whether this is a `Jog` with `enable: false`
    pub fn is_jog_stop(&self) -> bool {
        self.kind == CommandKind::Jog && self.fields.enable == Some(false)
    }
}

impl fmt::Display for ParsedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show<T: fmt::Display>(value: &Option<T>) -> String {
            value.as_ref().map_or_else(|| "-".into(), |v| v.to_string())
        }

        writeln!(f, "[LCU] Parsed Command:")?;
        writeln!(f, "  ID        : {}", self.command.id)?;
        writeln!(f, "  TYPE      : {}", self.command.msg_type)?;
        writeln!(f, "  NAME      : {}", self.kind)?;
        writeln!(f, "  AXIS      : {}", show(&self.fields.axis))?;
        writeln!(f, "  TARGET_DEG: {}", show(&self.fields.target_deg))?;
        writeln!(f, "  TARGET_POS: {}", show(&self.fields.target_pos))?;
        writeln!(f, "  VELOCITY  : {}", show(&self.fields.velocity))?;
        writeln!(f, "  ACCEL     : {}", show(&self.fields.accel))?;
        writeln!(f, "  DECEL     : {}", show(&self.fields.decel))?;
        write!(f, "  ENABLE    : {}", show(&self.fields.enable))
    }
}

/// Parse one frame payload
///
/// `v`, `id`, `type`, `name` and an object `body` are required. `v` is not
/// enforced beyond being a number.
pub fn parse_command(payload: &[u8]) -> Result<ParsedCommand, ParseError> {
    let command: Command = serde_json::from_slice(payload)?;

    let kind = command
        .kind()
        .ok_or_else(|| ParseError::UnknownCommand(command.name.clone()))?;

    if command.v != protocol::VERSION {
        warn!("[LCU] Command {} uses protocol version {}", command.id, command.v);
    }

    let fields = MotionFields::from_command(&command);
    Ok(ParsedCommand {
        command,
        kind,
        fields,
    })
}
