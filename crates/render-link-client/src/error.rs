use render_link_protocol::{ProtocolError, RpcError};
use thiserror::Error;

use crate::TransportError;

/// Synchronous failures: the batch was never handed to the transport.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not connected to the rendering service")]
    NotConnected,

    #[error("connection handshake has not completed")]
    NotReady,

    #[error("a connection is already attached")]
    AlreadyConnected,

    #[error("wait_for_render requires a render loop state")]
    RenderWaitWithoutRenderLoop,

    #[error("protocol version mismatch (client {client}, server {server})")]
    ProtocolMismatch { client: u32, server: u32 },

    #[error("unexpected {0} message in the current connection state")]
    Unexpected(&'static str),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("service state lock poisoned")]
    Poisoned,
}

/// Per-command failures, delivered through the command's own future.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("command failed with code {}: {}", .0.code, .0.message)]
    Remote(RpcError),

    #[error("the server's batch response did not include this command")]
    MissingResponse,

    #[error("connection closed before the response arrived: {0}")]
    Disconnected(String),

    #[error("the response was dropped without being settled")]
    Abandoned,
}
