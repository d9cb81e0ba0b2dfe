//! Client-side command batching for a remote rendering service.
//!
//! Callers obtain a [`CommandQueue`] from a connected [`Service`], append commands (optionally
//! asking for their responses), and submit the batch once. Submission either hands back one
//! [`PendingReply`] per response-requesting command ([`CommandQueue::send`]) or a single future
//! that collects every outcome in order ([`CommandQueue::execute`]). Queues created with
//! `wait_for_render` additionally yield a trailing render acknowledgement that settles once a
//! frame reflecting the batch is available.
//!
//! Submitting before the connection is usable fails synchronously with a [`ServiceError`]; a
//! failing command never aborts its batch and instead surfaces as a [`CommandError`] on its own
//! future.

#![forbid(unsafe_code)]

mod config;
mod deferred;
mod error;
mod queue;
mod service;
mod stats;
mod transport;

pub use config::{ConfigError, ServiceConfig};
pub use deferred::{deferred, Deferred, Resolver};
pub use error::{CommandError, ServiceError};
pub use queue::{BatchResults, CommandQueue, PendingReply, Reply};
pub use service::Service;
pub use stats::ServiceStatsSnapshot;
pub use transport::{ChannelTransport, Transport, TransportError};

pub use render_link_protocol::{Command, RenderLoopCancel, RenderedImage, RpcError, StateData};
