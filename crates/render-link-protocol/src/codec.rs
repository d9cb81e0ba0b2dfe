use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::{ClientMessage, ServerMessage};

pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024; // 16MiB
pub const DEFAULT_MAX_COMMANDS_PER_BATCH: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Upper bound on the size of one encoded text frame, in either direction.
    pub max_message_bytes: usize,
    pub max_commands_per_batch: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            max_commands_per_batch: DEFAULT_MAX_COMMANDS_PER_BATCH,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message is {len} bytes, limit is {max}")]
    MessageTooLarge { len: usize, max: usize },

    #[error("batch holds {len} commands, limit is {max}")]
    TooManyCommands { len: usize, max: usize },

    #[error("command {index} has an empty name")]
    EmptyCommandName { index: usize },

    #[error("response id {id} is used by more than one command")]
    DuplicateResponseId { id: u64 },

    #[error("malformed message: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value.to_string())
    }
}

pub fn encode_client_message(msg: &ClientMessage, limits: &Limits) -> Result<String, ProtocolError> {
    if let ClientMessage::Batch(batch) = msg {
        batch.validate(limits)?;
    }
    encode(msg, limits)
}

pub fn decode_client_message(text: &str, limits: &Limits) -> Result<ClientMessage, ProtocolError> {
    let msg: ClientMessage = decode(text, limits)?;
    if let ClientMessage::Batch(batch) = &msg {
        batch.validate(limits)?;
    }
    Ok(msg)
}

pub fn encode_server_message(msg: &ServerMessage, limits: &Limits) -> Result<String, ProtocolError> {
    encode(msg, limits)
}

pub fn decode_server_message(text: &str, limits: &Limits) -> Result<ServerMessage, ProtocolError> {
    decode(text, limits)
}

fn encode<T: Serialize>(msg: &T, limits: &Limits) -> Result<String, ProtocolError> {
    let text = serde_json::to_string(msg)?;
    check_len(text.len(), limits)?;
    Ok(text)
}

fn decode<T: DeserializeOwned>(text: &str, limits: &Limits) -> Result<T, ProtocolError> {
    check_len(text.len(), limits)?;
    Ok(serde_json::from_str(text)?)
}

fn check_len(len: usize, limits: &Limits) -> Result<(), ProtocolError> {
    if len > limits.max_message_bytes {
        return Err(ProtocolError::MessageTooLarge {
            len,
            max: limits.max_message_bytes,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_frames_are_rejected_in_both_directions() {
        let limits = Limits {
            max_message_bytes: 16,
            ..Limits::default()
        };
        let hello = ClientMessage::Hello {
            protocol_version: crate::PROTOCOL_VERSION,
        };
        assert!(matches!(
            encode_client_message(&hello, &limits),
            Err(ProtocolError::MessageTooLarge { max: 16, .. })
        ));

        let text = r#"{"type":"welcome","protocol_version":1,"session_id":"abc"}"#;
        assert_eq!(
            decode_server_message(text, &limits),
            Err(ProtocolError::MessageTooLarge {
                len: text.len(),
                max: 16
            })
        );
    }

    #[test]
    fn unknown_message_type_is_malformed() {
        let err = decode_server_message(r#"{"type":"nope"}"#, &Limits::default()).unwrap_err();
        assert!(matches!(err, ProtocolError::Json(_)), "{err:?}");
    }
}
