use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use render_link_protocol::{
    decode_server_message, encode_client_message, BatchRequest, ClientMessage, CommandRequest,
    CommandResponse, Limits, RenderedImage, RpcError, ServerMessage, StateData, PROTOCOL_VERSION,
};

use crate::{
    deferred,
    queue::{QueuedBatch, QueuedCommand},
    stats::ServiceStats,
    CommandError, CommandQueue, PendingReply, Reply, Resolver, ServiceConfig,
    ServiceError, ServiceStatsSnapshot, Transport,
};

enum Connection {
    Closed,
    Handshaking {
        transport: Arc<dyn Transport>,
    },
    Open {
        transport: Arc<dyn Transport>,
        session_id: String,
    },
}

/// Resolvers of a submitted batch, keyed by command correlation id.
struct InFlightBatch {
    pending: BTreeMap<u64, Resolver<Reply>>,
}

struct RenderWait {
    render_loop_name: String,
    resolver: Resolver<Reply>,
    /// Set once the batch's command responses have been settled.
    responses_settled: bool,
    /// First matching frame, held until the responses are settled.
    image: Option<RenderedImage>,
}

struct ServiceState {
    connection: Connection,
    next_batch_id: u64,
    next_command_id: u64,
    in_flight: HashMap<u64, InFlightBatch>,
    render_waits: BTreeMap<u64, RenderWait>,
}

/// Client session with the rendering service.
///
/// Owns the connection state and every outstanding future. Wrap it in an `Arc` so the socket's
/// receive loop can call [`handle_text`](Self::handle_text) while callers build and submit queues.
pub struct Service {
    cfg: ServiceConfig,
    limits: Limits,
    /// Serializes outbound frames; never taken by inbound handling.
    wire: Mutex<()>,
    state: Mutex<ServiceState>,
    stats: ServiceStats,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("cfg", &self.cfg)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl Service {
    pub fn new(cfg: ServiceConfig) -> Self {
        Self {
            limits: cfg.limits(),
            cfg,
            wire: Mutex::new(()),
            state: Mutex::new(ServiceState {
                connection: Connection::Closed,
                next_batch_id: 1,
                next_command_id: 1,
                in_flight: HashMap::new(),
                render_waits: BTreeMap::new(),
            }),
            stats: ServiceStats::default(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.cfg
    }

    pub fn stats(&self) -> ServiceStatsSnapshot {
        self.stats.snapshot()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ServiceState>, ServiceError> {
        self.state.lock().map_err(|_| ServiceError::Poisoned)
    }

    fn lock_wire(&self) -> Result<MutexGuard<'_, ()>, ServiceError> {
        self.wire.lock().map_err(|_| ServiceError::Poisoned)
    }

    /// Read-only view of the state for the infallible accessors.
    fn inspect<T>(&self, f: impl FnOnce(&ServiceState) -> T) -> Option<T> {
        match self.lock() {
            Ok(state) => Some(f(&*state)),
            Err(err) => {
                tracing::warn!("session state unavailable: {err}");
                None
            }
        }
    }

    /// Attaches `transport` and starts the handshake. Batches can be submitted once the server's
    /// `Welcome` has been passed to [`handle_message`](Self::handle_message).
    pub fn connect(&self, transport: Arc<dyn Transport>) -> Result<(), ServiceError> {
        let _wire = self.lock_wire()?;
        let hello = encode_client_message(
            &ClientMessage::Hello {
                protocol_version: PROTOCOL_VERSION,
            },
            &self.limits,
        )?;
        {
            let mut state = self.lock()?;
            if !matches!(state.connection, Connection::Closed) {
                return Err(ServiceError::AlreadyConnected);
            }
            state.connection = Connection::Handshaking {
                transport: Arc::clone(&transport),
            };
        }

        if let Err(err) = transport.send_text(hello) {
            let mut state = self.lock()?;
            if matches!(state.connection, Connection::Handshaking { .. }) {
                state.connection = Connection::Closed;
            }
            return Err(err.into());
        }
        tracing::debug!("sent hello, waiting for welcome");
        Ok(())
    }

    /// Closes the transport and rejects every outstanding future.
    pub fn disconnect(&self, reason: &str) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        match std::mem::replace(&mut state.connection, Connection::Closed) {
            Connection::Closed => {}
            Connection::Handshaking { transport } | Connection::Open { transport, .. } => {
                transport.close();
            }
        }

        let in_flight = std::mem::take(&mut state.in_flight);
        let render_waits = std::mem::take(&mut state.render_waits);
        tracing::debug!(
            batches = in_flight.len(),
            render_waits = render_waits.len(),
            "disconnected: {reason}"
        );

        for batch in in_flight.into_values() {
            for resolver in batch.pending.into_values() {
                self.reject(resolver, CommandError::Disconnected(reason.to_string()));
            }
        }
        for wait in render_waits.into_values() {
            self.reject(wait.resolver, CommandError::Disconnected(reason.to_string()));
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.inspect(|state| !matches!(state.connection, Connection::Closed))
            .unwrap_or(false)
    }

    /// Whether the handshake has completed and batches can be submitted.
    pub fn is_ready(&self) -> bool {
        self.inspect(|state| matches!(state.connection, Connection::Open { .. }))
            .unwrap_or(false)
    }

    pub fn session_id(&self) -> Option<String> {
        self.inspect(|state| match &state.connection {
            Connection::Open { session_id, .. } => Some(session_id.clone()),
            _ => None,
        })
        .flatten()
    }

    /// Starts a new batch that executes against `state`.
    ///
    /// With `wait_for_render`, submission yields one extra future that resolves with the first
    /// rendered image containing the batch's effects; `state` must then name a render loop.
    pub fn queue_commands(&self, wait_for_render: bool, state: StateData) -> CommandQueue<'_> {
        CommandQueue::new(self, wait_for_render, state)
    }

    pub(crate) fn send_command_queue(
        &self,
        batch: QueuedBatch,
    ) -> Result<Vec<PendingReply>, ServiceError> {
        // Held until the frame is handed to the transport so batch ids reach the wire in order.
        let _wire = self.lock_wire()?;
        let mut state = self.lock()?;
        let transport = match &state.connection {
            Connection::Closed => return Err(ServiceError::NotConnected),
            Connection::Handshaking { .. } => return Err(ServiceError::NotReady),
            Connection::Open { transport, .. } => Arc::clone(transport),
        };
        let render_loop_name = match (batch.wait_for_render, batch.state.render_loop_name()) {
            (false, _) => None,
            (true, Some(name)) => Some(name.to_owned()),
            (true, None) => return Err(ServiceError::RenderWaitWithoutRenderLoop),
        };

        let batch_id = state.next_batch_id;
        let mut next_command_id = state.next_command_id;
        let mut requests = Vec::with_capacity(batch.commands.len());
        let mut pending = BTreeMap::new();
        let mut replies = Vec::new();
        for queued in batch.commands {
            match queued {
                QueuedCommand::Notify(command) => {
                    requests.push(CommandRequest::new(command, None));
                }
                QueuedCommand::Respond {
                    command,
                    resolver,
                    pending: reply,
                } => {
                    let id = next_command_id;
                    next_command_id += 1;
                    requests.push(CommandRequest::new(command, Some(id)));
                    pending.insert(id, resolver);
                    replies.push(reply);
                }
            }
        }

        let commands = requests.len();
        let request = BatchRequest {
            batch_id,
            state: batch.state,
            wait_for_render: batch.wait_for_render,
            commands: requests,
        };
        let text = encode_client_message(&ClientMessage::Batch(request), &self.limits)?;

        state.next_batch_id += 1;
        state.next_command_id = next_command_id;
        let responses = pending.len();
        state.in_flight.insert(batch_id, InFlightBatch { pending });
        if let Some(render_loop_name) = render_loop_name {
            let (resolver, reply) = deferred();
            state.render_waits.insert(
                batch_id,
                RenderWait {
                    render_loop_name,
                    resolver,
                    responses_settled: false,
                    image: None,
                },
            );
            replies.push(reply);
        }
        drop(state);

        if let Err(err) = transport.send_text(text) {
            // Dropping the resolvers leaves early observers with `Abandoned`.
            let mut state = self.lock()?;
            state.in_flight.remove(&batch_id);
            state.render_waits.remove(&batch_id);
            return Err(err.into());
        }

        self.stats.record_batch(commands);
        tracing::debug!(
            batch_id,
            commands,
            responses,
            wait_for_render = batch.wait_for_render,
            mode = ?batch.mode,
            "sent command batch"
        );
        Ok(replies)
    }

    /// Decodes one inbound text frame and applies it.
    pub fn handle_text(&self, text: &str) -> Result<(), ServiceError> {
        let msg = decode_server_message(text, &self.limits)?;
        self.handle_message(msg)
    }

    pub fn handle_message(&self, msg: ServerMessage) -> Result<(), ServiceError> {
        match msg {
            ServerMessage::Welcome {
                protocol_version,
                session_id,
            } => self.on_welcome(protocol_version, session_id),
            ServerMessage::BatchResponse {
                batch_id,
                responses,
            } => self.on_batch_response(batch_id, responses),
            ServerMessage::BatchError { batch_id, error } => self.on_batch_error(batch_id, error),
            ServerMessage::RenderedImage(image) => self.on_rendered_image(image),
        }
    }

    fn on_welcome(&self, protocol_version: u32, session_id: String) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let transport = match std::mem::replace(&mut state.connection, Connection::Closed) {
            Connection::Handshaking { transport } => transport,
            other => {
                state.connection = other;
                return Err(ServiceError::Unexpected("welcome"));
            }
        };

        if protocol_version != PROTOCOL_VERSION {
            transport.close();
            tracing::warn!(
                client = PROTOCOL_VERSION,
                server = protocol_version,
                "protocol version mismatch, closing connection"
            );
            return Err(ServiceError::ProtocolMismatch {
                client: PROTOCOL_VERSION,
                server: protocol_version,
            });
        }

        tracing::debug!(%session_id, "handshake complete");
        state.connection = Connection::Open {
            transport,
            session_id,
        };
        Ok(())
    }

    fn on_batch_response(
        &self,
        batch_id: u64,
        responses: Vec<CommandResponse>,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let Some(mut batch) = state.in_flight.remove(&batch_id) else {
            tracing::warn!(batch_id, "response for unknown batch");
            return Ok(());
        };

        for response in responses {
            let Some(resolver) = batch.pending.remove(&response.id) else {
                tracing::warn!(batch_id, id = response.id, "response for unknown command");
                continue;
            };
            match response.into_result() {
                Ok(value) => {
                    resolver.resolve(Reply::Response(value));
                    self.stats.inc_responses_resolved();
                }
                Err(err) => self.reject(resolver, CommandError::Remote(err)),
            }
        }
        for (id, resolver) in batch.pending {
            tracing::warn!(batch_id, id, "batch response is missing a command");
            self.reject(resolver, CommandError::MissingResponse);
        }

        let ready = match state.render_waits.get_mut(&batch_id) {
            Some(wait) => {
                wait.responses_settled = true;
                wait.image.is_some()
            }
            None => false,
        };
        if ready {
            if let Some(RenderWait {
                resolver,
                image: Some(image),
                ..
            }) = state.render_waits.remove(&batch_id)
            {
                self.deliver_render(batch_id, resolver, image);
            }
        }
        Ok(())
    }

    fn on_batch_error(&self, batch_id: u64, error: RpcError) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        tracing::debug!(batch_id, code = error.code, "batch failed: {}", error.message);

        if let Some(batch) = state.in_flight.remove(&batch_id) {
            for resolver in batch.pending.into_values() {
                self.reject(resolver, CommandError::Remote(error.clone()));
            }
        }
        if let Some(wait) = state.render_waits.remove(&batch_id) {
            self.reject(wait.resolver, CommandError::Remote(error));
        }
        Ok(())
    }

    fn on_rendered_image(&self, image: RenderedImage) -> Result<(), ServiceError> {
        let mut state = self.lock()?;

        let mut ready = Vec::new();
        for (&batch_id, wait) in state.render_waits.range_mut(..=image.batch_id) {
            if wait.render_loop_name != image.render_loop_name {
                continue;
            }
            if wait.responses_settled {
                ready.push(batch_id);
            } else if wait.image.is_none() {
                wait.image = Some(image.clone());
            }
        }

        if ready.is_empty() {
            tracing::trace!(
                render_loop = %image.render_loop_name,
                batch_id = image.batch_id,
                "rendered image with no ready waiters"
            );
        }
        for batch_id in ready {
            if let Some(wait) = state.render_waits.remove(&batch_id) {
                self.deliver_render(batch_id, wait.resolver, image.clone());
            }
        }
        Ok(())
    }

    fn deliver_render(&self, batch_id: u64, resolver: Resolver<Reply>, image: RenderedImage) {
        tracing::debug!(
            batch_id,
            render_loop = %image.render_loop_name,
            frame_batch_id = image.batch_id,
            "render acknowledged"
        );
        resolver.resolve(Reply::Rendered(image));
        self.stats.inc_renders_delivered();
    }

    fn reject(&self, resolver: Resolver<Reply>, err: CommandError) {
        resolver.reject(err);
        self.stats.inc_responses_rejected();
    }
}
