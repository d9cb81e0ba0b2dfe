use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{codec::Limits, Command, ProtocolError, StateData};

/// One command as it travels on the wire.
///
/// `id` is present iff the client wants a response. Commands without an id are notifications and
/// the server never answers them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub method: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl CommandRequest {
    pub fn new(command: Command, id: Option<u64>) -> Self {
        Self {
            method: command.name,
            params: command.params,
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub batch_id: u64,
    pub state: StateData,
    #[serde(default)]
    pub wait_for_render: bool,
    pub commands: Vec<CommandRequest>,
}

impl BatchRequest {
    /// Ids of the commands that expect a response, in submission order.
    pub fn response_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.commands.iter().filter_map(|cmd| cmd.id)
    }

    pub fn validate(&self, limits: &Limits) -> Result<(), ProtocolError> {
        if self.commands.len() > limits.max_commands_per_batch {
            return Err(ProtocolError::TooManyCommands {
                len: self.commands.len(),
                max: limits.max_commands_per_batch,
            });
        }

        let mut seen = HashSet::new();
        for (index, cmd) in self.commands.iter().enumerate() {
            if cmd.method.trim().is_empty() {
                return Err(ProtocolError::EmptyCommandName { index });
            }
            if let Some(id) = cmd.id {
                if !seen.insert(id) {
                    return Err(ProtocolError::DuplicateResponseId { id });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello { protocol_version: u32 },
    Batch(BatchRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl CommandResponse {
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: u64, error: RpcError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    /// An error wins over a result; a response with neither resolves to `null`.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match (self.error, self.result) {
            (Some(err), _) => Err(err),
            (None, Some(value)) => Ok(value),
            (None, None) => Ok(Value::Null),
        }
    }
}

/// A rendered frame that reflects every batch up to and including `batch_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedImage {
    pub render_loop_name: String,
    pub batch_id: u64,
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol_version: u32,
        session_id: String,
    },
    BatchResponse {
        batch_id: u64,
        #[serde(default)]
        responses: Vec<CommandResponse>,
    },
    BatchError {
        batch_id: u64,
        error: RpcError,
    },
    RenderedImage(RenderedImage),
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        STANDARD
            .decode(raw.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
