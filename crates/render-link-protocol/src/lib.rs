//! Wire protocol spoken between a render-link client and the remote rendering service.
//!
//! Every message is a single JSON text frame. The client opens with [`ClientMessage::Hello`] and
//! may only submit batches once the server has answered with [`ServerMessage::Welcome`]. A batch is
//! an ordered list of commands; commands that carry an `id` expect a response, the rest are
//! fire-and-forget notifications. The server answers every batch with exactly one
//! [`ServerMessage::BatchResponse`] (or [`ServerMessage::BatchError`]) and, for render-loop
//! batches, later emits [`ServerMessage::RenderedImage`] frames tagged with the highest batch id
//! they reflect.

#![forbid(unsafe_code)]

mod codec;
mod command;
mod message;

pub use codec::{
    decode_client_message, decode_server_message, encode_client_message, encode_server_message,
    Limits, ProtocolError, DEFAULT_MAX_COMMANDS_PER_BATCH, DEFAULT_MAX_MESSAGE_BYTES,
};
pub use command::{Command, RenderLoopCancel, StateData};
pub use message::{
    BatchRequest, ClientMessage, CommandRequest, CommandResponse, RenderedImage, RpcError,
    ServerMessage,
};

/// Protocol version exchanged during the `Hello`/`Welcome` handshake.
pub const PROTOCOL_VERSION: u32 = 1;
