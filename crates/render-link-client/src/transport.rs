use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("transport I/O error: {0}")]
    Io(String),
}

/// Outbound half of the streaming connection.
///
/// Implementations must not block. `send_text` is called with outbound frames serialized, so batch
/// ids reach the wire in the order they were assigned, but without the session state locked: it
/// may query the [`Service`](crate::Service) or feed it inbound frames, but must not connect or
/// submit another batch from inside the call. Inbound frames are fed back through
/// [`Service::handle_text`](crate::Service::handle_text) by whoever owns the socket.
pub trait Transport: Send + Sync {
    fn send_text(&self, text: String) -> Result<(), TransportError>;

    fn close(&self) {}
}

/// Transport that forwards frames into an unbounded channel drained by a socket writer task.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl ChannelTransport {
    pub fn pair() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                tx: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }
}

impl Transport for ChannelTransport {
    fn send_text(&self, text: String) -> Result<(), TransportError> {
        let tx = self
            .tx
            .lock()
            .map_err(|_| TransportError::Io("poisoned lock".to_string()))?;
        match tx.as_ref() {
            Some(tx) => tx.send(text).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_arrive_in_order_until_closed() {
        let (transport, mut rx) = ChannelTransport::pair();
        transport.send_text("a".into()).unwrap();
        transport.send_text("b".into()).unwrap();
        transport.close();

        assert_eq!(rx.try_recv().unwrap(), "a");
        assert_eq!(rx.try_recv().unwrap(), "b");
        assert!(rx.try_recv().is_err());
        assert_eq!(transport.send_text("c".into()), Err(TransportError::Closed));
    }

    #[test]
    fn dropped_receiver_reports_closed() {
        let (transport, rx) = ChannelTransport::pair();
        drop(rx);
        assert_eq!(transport.send_text("a".into()), Err(TransportError::Closed));
    }
}
