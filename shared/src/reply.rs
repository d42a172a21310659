//! Command acknowledgement published by the LCU on the ack topic

use serde::{Deserialize, Serialize};

use crate::codec::CodecError;
use crate::command::Command;
use crate::protocol;

/// Result code for a successfully executed command
pub const CODE_OK: &str = "OK";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyResult {
    pub ok: bool,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyBody {
    pub result: ReplyResult,
}

/// Reply to a single command, correlated by `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub v: u32,
    pub id: String,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub name: String,
    pub src: String,
    pub body: ReplyBody,
}

impl Reply {
    /// Create a reply for `command` with the given result code
    ///
    /// `ok` is derived from the code, so only `"OK"` counts as success.
    pub fn new(command: &Command, code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            v: protocol::VERSION,
            id: command.id.clone(),
            msg_type: protocol::REPLY_TYPE.into(),
            name: command.name.clone(),
            src: protocol::LCU_SOURCE.into(),
            body: ReplyBody {
                result: ReplyResult {
                    ok: code == CODE_OK,
                    code,
                    message: message.into(),
                },
            },
        }
    }

    /// Create a success reply
    pub fn executed(command: &Command) -> Self {
        Self::new(command, CODE_OK, "Command executed")
    }

    pub fn is_ok(&self) -> bool {
        self.body.result.ok
    }

    /// Compact JSON suitable for an MQTT payload
    pub fn to_vec(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_slice(payload: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(payload)?)
    }
}
