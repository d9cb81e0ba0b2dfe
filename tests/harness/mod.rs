#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use render_link_client::{ChannelTransport, RenderedImage, Service};
use render_link_protocol::{
    decode_client_message, encode_server_message, BatchRequest, ClientMessage, CommandResponse,
    Limits, RpcError, ServerMessage,
};
use serde_json::json;
use tokio::task::JoinHandle;

/// How the scripted render server reacts to batches.
#[derive(Clone, Debug)]
pub struct ServerScript {
    pub session_id: String,
    /// Commands with these names are answered with an error response.
    pub failing_methods: HashSet<String>,
    /// Emit the rendered frame before the batch response.
    pub frames_first: bool,
    /// Record batches without answering them.
    pub silent: bool,
}

impl Default for ServerScript {
    fn default() -> Self {
        Self {
            session_id: "render-session".to_string(),
            failing_methods: HashSet::new(),
            frames_first: false,
            silent: false,
        }
    }
}

pub struct ScriptedServer {
    task: JoinHandle<Result<Vec<BatchRequest>>>,
}

impl ScriptedServer {
    /// Connects `service` to a server task that answers according to `script`.
    pub async fn start(service: Arc<Service>, script: ServerScript) -> Result<Self> {
        let (transport, mut rx) = ChannelTransport::pair();
        service.connect(transport)?;

        let task = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let limits = Limits::default();
                let mut batches = Vec::new();
                while let Some(text) = rx.recv().await {
                    match decode_client_message(&text, &limits)? {
                        ClientMessage::Hello { protocol_version } => {
                            push(
                                &service,
                                ServerMessage::Welcome {
                                    protocol_version,
                                    session_id: script.session_id.clone(),
                                },
                            )?;
                        }
                        ClientMessage::Batch(batch) => {
                            if !script.silent {
                                answer(&service, &script, &batch)?;
                            }
                            batches.push(batch);
                        }
                    }
                }
                Ok::<_, anyhow::Error>(batches)
            })
        };

        tokio::time::timeout(Duration::from_secs(2), async {
            while !service.is_ready() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .context("handshake did not complete")?;

        Ok(Self { task })
    }

    /// Waits for the connection to close and returns every batch the server saw.
    pub async fn finish(self) -> Result<Vec<BatchRequest>> {
        tokio::time::timeout(Duration::from_secs(2), self.task)
            .await
            .context("server did not stop")?
            .map_err(|err| anyhow!("server task failed: {err}"))?
    }
}

fn answer(service: &Service, script: &ServerScript, batch: &BatchRequest) -> Result<()> {
    let responses = batch
        .commands
        .iter()
        .filter_map(|cmd| {
            let id = cmd.id?;
            Some(if script.failing_methods.contains(&cmd.method) {
                CommandResponse::err(id, RpcError::new(-32601, format!("{} failed", cmd.method)))
            } else {
                CommandResponse::ok(id, json!({ "method": cmd.method, "params": cmd.params }))
            })
        })
        .collect();
    let response = ServerMessage::BatchResponse {
        batch_id: batch.batch_id,
        responses,
    };

    let frame = match (batch.state.render_loop_name(), batch.wait_for_render) {
        (Some(name), true) => Some(ServerMessage::RenderedImage(frame(name, batch.batch_id))),
        (None, true) => bail!("render wait for batch {} without a render loop", batch.batch_id),
        (_, false) => None,
    };

    match frame {
        Some(frame) if script.frames_first => {
            push(service, frame)?;
            push(service, response)
        }
        Some(frame) => {
            push(service, response)?;
            push(service, frame)
        }
        None => push(service, response),
    }
}

fn push(service: &Service, msg: ServerMessage) -> Result<()> {
    let text = encode_server_message(&msg, &Limits::default())?;
    service.handle_text(&text)?;
    Ok(())
}

pub fn frame(render_loop_name: &str, batch_id: u64) -> RenderedImage {
    RenderedImage {
        render_loop_name: render_loop_name.to_string(),
        batch_id,
        width: 640,
        height: 480,
        mime_type: "image/png".to_string(),
        data: vec![0x89, b'P', b'N', b'G'],
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
