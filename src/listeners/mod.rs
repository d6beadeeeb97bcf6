//! Listeners: sources of incoming payloads.

pub mod channel;
pub mod cli;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::ListenerError;
use crate::pipeline::types::Incoming;

pub use channel::ChannelListener;
pub use cli::StdinListener;

/// The orchestrator's entry point, installed on a listener before it starts.
#[derive(Clone)]
pub struct ListenerCallback {
    inner: Arc<dyn Fn(Incoming) -> BoxFuture<'static, ()> + Send + Sync>,
}

impl ListenerCallback {
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(Incoming) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |incoming| callback(incoming).boxed()),
        }
    }

    /// Hand one payload to the orchestrator and wait until it is dispatched.
    pub async fn fire(&self, incoming: Incoming) {
        (self.inner)(incoming).await
    }
}

impl std::fmt::Debug for ListenerCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ListenerCallback")
    }
}

/// A source of incoming payloads (chat connection, stdin, queue, ...).
#[async_trait]
pub trait Listener: Send + Sync {
    /// Listener name for logging.
    fn name(&self) -> &str;

    /// Install the callback every received payload is handed to.
    fn set_callback(&mut self, callback: ListenerCallback);

    /// Receive payloads until the source closes.
    ///
    /// Fails with [`ListenerError::NoCallback`] if no callback is installed.
    async fn start(&self) -> Result<(), ListenerError>;
}
