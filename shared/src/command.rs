//! Command envelope
//!
//! Every frame on the WCS -> LCU link carries one JSON object:
//! ```text
//! {"v":1,"id":"CMD_001","type":"Command","name":"EnableDrive","src":"wcs","body":{...},"meta":{}}
//! ```
//! `body` is an open, name-keyed schema. Typed builders live in [`crate::body`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::body::CommandBody;
use crate::codec::CodecError;
use crate::protocol;

/// JSON object used for `body` and `meta` (insertion ordered)
pub type Fields = Map<String, Value>;

/// A single command frame payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub v: u32,
    pub id: String,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub name: String,
    #[serde(default)]
    pub src: String,
    pub body: Fields,
    #[serde(default)]
    pub meta: Fields,
}

impl Command {
    /// Create a WCS command with an arbitrary name and body
    pub fn new(id: impl Into<String>, name: impl Into<String>, body: Fields) -> Self {
        Self {
            v: protocol::VERSION,
            id: id.into(),
            msg_type: protocol::COMMAND_TYPE.into(),
            name: name.into(),
            src: protocol::WCS_SOURCE.into(),
            body,
            meta: Fields::new(),
        }
    }

    /// Create a command from a typed body, taking the name from the body type
    pub fn from_body<B: CommandBody>(id: impl Into<String>, body: &B) -> Result<Self, CodecError> {
        match serde_json::to_value(body)? {
            Value::Object(fields) => Ok(Self::new(id, B::KIND.as_str(), fields)),
            _ => Err(CodecError::BodyNotObject),
        }
    }

    /// Map the free-form `name` onto a known command kind
    pub fn kind(&self) -> Option<CommandKind> {
        CommandKind::from_name(&self.name)
    }

    /// Look up a single body field
    pub fn body_field(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }
}

/// Command names understood by the LCU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    EnableDrive,
    DisableDrive,
    ResetDrive,
    EStop,
    SetAngleParams,
    SetMotionParams,
    Move,
    MoveDeg,
    JogFwd,
    JogRev,
    Halt,
    Solenoid,
    Jog,
    MovePosition,
    MoveToPositionDeg,
}

impl CommandKind {
    pub const ALL: [CommandKind; 15] = [
        CommandKind::EnableDrive,
        CommandKind::DisableDrive,
        CommandKind::ResetDrive,
        CommandKind::EStop,
        CommandKind::SetAngleParams,
        CommandKind::SetMotionParams,
        CommandKind::Move,
        CommandKind::MoveDeg,
        CommandKind::JogFwd,
        CommandKind::JogRev,
        CommandKind::Halt,
        CommandKind::Solenoid,
        CommandKind::Jog,
        CommandKind::MovePosition,
        CommandKind::MoveToPositionDeg,
    ];

    /// Wire name of this command
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::EnableDrive => "EnableDrive",
            CommandKind::DisableDrive => "DisableDrive",
            CommandKind::ResetDrive => "ResetDrive",
            CommandKind::EStop => "EStop",
            CommandKind::SetAngleParams => "SetAngleParams",
            CommandKind::SetMotionParams => "SetMotionParams",
            CommandKind::Move => "Move",
            CommandKind::MoveDeg => "MoveDeg",
            CommandKind::JogFwd => "JogFwd",
            CommandKind::JogRev => "JogRev",
            CommandKind::Halt => "Halt",
            CommandKind::Solenoid => "Solenoid",
            CommandKind::Jog => "Jog",
            CommandKind::MovePosition => "MovePosition",
            CommandKind::MoveToPositionDeg => "MoveToPositionDeg",
        }
    }

    /// Parse a wire name (case sensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
