//! Job Handle Module
//!
//! Awaitable handle to an operation spawned by one of the primitives.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::error::Error;

// == Job Handle ==
/// Handle to an admitted operation.
///
/// Resolves to the operation's own output, unchanged, or to an [`Error`] when
/// the operation panicked or was cancelled by runtime shutdown. Dropping the
/// handle detaches it: the operation keeps running and its bookkeeping is
/// still released when it settles.
#[derive(Debug)]
pub struct JobHandle<T> {
    task: JoinHandle<T>,
}

impl<T: Send + 'static> JobHandle<T> {
    /// Spawns `future` on the current Tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub(crate) fn spawn<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        Self {
            task: tokio::spawn(future),
        }
    }
}

impl<T> JobHandle<T> {
    /// Returns true once the operation has settled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<T> Future for JobHandle<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.task)
            .poll(cx)
            .map(|joined| joined.map_err(Error::from))
    }
}
