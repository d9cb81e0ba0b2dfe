//! One-shot values that are settled by the service and observed by any number of callers.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::future::{FutureExt, Shared};
use tokio::sync::oneshot;

use crate::CommandError;

type Slot<T> = oneshot::Receiver<Result<T, CommandError>>;

/// Creates an unsettled value and the handle that settles it.
pub fn deferred<T: Clone>() -> (Resolver<T>, Deferred<T>) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx }, Deferred { rx: rx.shared() })
}

/// Awaitable side of a [`deferred`] pair. Clones observe the same outcome.
pub struct Deferred<T: Clone> {
    rx: Shared<Slot<T>>,
}

impl<T: Clone> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T: Clone> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").finish_non_exhaustive()
    }
}

impl<T: Clone> Future for Deferred<T> {
    type Output = Result<T, CommandError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped resolver means the service went away without an answer.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(CommandError::Abandoned)))
    }
}

/// Settling side of a [`deferred`] pair. Consumed on use, so a value settles at most once.
pub struct Resolver<T> {
    tx: oneshot::Sender<Result<T, CommandError>>,
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("observed", &!self.tx.is_closed())
            .finish()
    }
}

impl<T> Resolver<T> {
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self, err: CommandError) {
        self.settle(Err(err));
    }

    pub fn settle(self, outcome: Result<T, CommandError>) {
        // Nobody is listening once every `Deferred` clone is gone.
        let _ = self.tx.send(outcome);
    }
}
