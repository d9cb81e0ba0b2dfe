use futures_util::future::{join_all, JoinAll};
use render_link_protocol::{Command, RenderedImage, StateData};
use serde_json::Value;

use crate::{deferred, Deferred, Resolver, Service, ServiceError};

/// Future for one response-requesting command, or for a batch's render acknowledgement.
pub type PendingReply = Deferred<Reply>;

/// Future returned by [`CommandQueue::execute`]; yields every outcome in submission order.
pub type BatchResults = JoinAll<PendingReply>;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Result of a command.
    Response(Value),
    /// First frame that reflects the batch.
    Rendered(RenderedImage),
}

impl Reply {
    pub fn as_response(&self) -> Option<&Value> {
        match self {
            Self::Response(value) => Some(value),
            Self::Rendered(_) => None,
        }
    }

    pub fn into_response(self) -> Option<Value> {
        match self {
            Self::Response(value) => Some(value),
            Self::Rendered(_) => None,
        }
    }

    pub fn into_rendered(self) -> Option<RenderedImage> {
        match self {
            Self::Rendered(image) => Some(image),
            Self::Response(_) => None,
        }
    }
}

/// How the caller asked for results; carried to the service with the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitMode {
    /// [`CommandQueue::send`]: one future per response.
    Each,
    /// [`CommandQueue::execute`]: one future for the whole batch.
    All,
}

#[derive(Debug)]
pub(crate) enum QueuedCommand {
    Notify(Command),
    Respond {
        command: Command,
        resolver: Resolver<Reply>,
        pending: PendingReply,
    },
}

#[derive(Debug)]
pub(crate) struct QueuedBatch {
    pub(crate) commands: Vec<QueuedCommand>,
    pub(crate) wait_for_render: bool,
    pub(crate) state: StateData,
    pub(crate) mode: SubmitMode,
}

/// An ordered batch of commands under construction.
///
/// Created by [`Service::queue_commands`]. Commands are only ever appended; the batch is consumed
/// by [`send`](Self::send) or [`execute`](Self::execute), so it cannot be submitted twice or
/// extended after submission:
///
/// ```compile_fail
/// # use render_link_client::{Command, Service, ServiceConfig, StateData};
/// let service = Service::new(ServiceConfig::default());
/// let mut queue = service.queue_commands(false, StateData::default());
/// queue.queue(Command::new("a"), true);
/// let _ = queue.send();
/// let _ = queue.send();
/// ```
///
/// ```compile_fail
/// # use render_link_client::{Command, Service, ServiceConfig, StateData};
/// let service = Service::new(ServiceConfig::default());
/// let mut queue = service.queue_commands(false, StateData::default());
/// let _ = queue.execute();
/// queue.queue(Command::new("late"), true);
/// ```
///
/// The same calls made once, in order, compile:
///
/// ```
/// # use render_link_client::{Command, Service, ServiceConfig, ServiceError, StateData};
/// let service = Service::new(ServiceConfig::default());
/// let mut queue = service.queue_commands(false, StateData::default());
/// queue.queue(Command::new("a"), true);
/// assert!(matches!(queue.send(), Err(ServiceError::NotConnected)));
/// ```
#[derive(Debug)]
#[must_use = "a command queue does nothing until it is sent or executed"]
pub struct CommandQueue<'s> {
    service: &'s Service,
    wait_for_render: bool,
    state: StateData,
    commands: Vec<QueuedCommand>,
}

impl<'s> CommandQueue<'s> {
    pub(crate) fn new(service: &'s Service, wait_for_render: bool, state: StateData) -> Self {
        Self {
            service,
            wait_for_render,
            state,
            commands: Vec::new(),
        }
    }

    /// Appends `command`. When `want_response` is set its future is created right away and can be
    /// fetched with [`pending`](Self::pending) before the batch is submitted.
    pub fn queue(&mut self, command: Command, want_response: bool) -> &mut Self {
        let entry = if want_response {
            let (resolver, pending) = deferred();
            QueuedCommand::Respond {
                command,
                resolver,
                pending,
            }
        } else {
            QueuedCommand::Notify(command)
        };
        self.commands.push(entry);
        self
    }

    /// Response future of the command at `index`, if that command asked for one.
    pub fn pending(&self, index: usize) -> Option<PendingReply> {
        match self.commands.get(index)? {
            QueuedCommand::Respond { pending, .. } => Some(pending.clone()),
            QueuedCommand::Notify(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of commands that asked for a response.
    pub fn response_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|cmd| matches!(cmd, QueuedCommand::Respond { .. }))
            .count()
    }

    pub fn wait_for_render(&self) -> bool {
        self.wait_for_render
    }

    pub fn state(&self) -> &StateData {
        &self.state
    }

    /// Submits the batch and returns one future per response-requesting command, in append order,
    /// followed by the render acknowledgement when the queue waits for render.
    pub fn send(self) -> Result<Vec<PendingReply>, ServiceError> {
        self.submit(SubmitMode::Each)
    }

    /// Submits the batch and returns a single future that completes once every response (and the
    /// render acknowledgement, if any) has settled. Failed commands show up as `Err` elements.
    pub fn execute(self) -> Result<BatchResults, ServiceError> {
        self.submit(SubmitMode::All).map(join_all)
    }

    fn submit(self, mode: SubmitMode) -> Result<Vec<PendingReply>, ServiceError> {
        let Self {
            service,
            wait_for_render,
            state,
            commands,
        } = self;
        service.send_command_queue(QueuedBatch {
            commands,
            wait_for_render,
            state,
            mode,
        })
    }
}
