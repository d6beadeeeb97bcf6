//! In-process listener fed through a tokio channel.
//!
//! Useful for embedding the bot behind another transport and for tests.

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::error::ListenerError;
use crate::listeners::{Listener, ListenerCallback};
use crate::pipeline::types::Incoming;

pub struct ChannelListener {
    receiver: Mutex<Option<mpsc::Receiver<Incoming>>>,
    callback: Option<ListenerCallback>,
}

impl ChannelListener {
    /// Create a listener and the sender that feeds it.
    pub fn new(buffer: usize) -> (Self, mpsc::Sender<Incoming>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::from_receiver(rx), tx)
    }

    pub fn from_receiver(receiver: mpsc::Receiver<Incoming>) -> Self {
        Self {
            receiver: Mutex::new(Some(receiver)),
            callback: None,
        }
    }
}

#[async_trait]
impl Listener for ChannelListener {
    fn name(&self) -> &str {
        "channel"
    }

    fn set_callback(&mut self, callback: ListenerCallback) {
        self.callback = Some(callback);
    }

    /// Drains the channel; returns once every sender is dropped.
    async fn start(&self) -> Result<(), ListenerError> {
        let callback = self.callback.as_ref().ok_or_else(|| ListenerError::NoCallback {
            name: self.name().to_string(),
        })?;
        let receiver = self.receiver.lock().await.take();
        let mut receiver = receiver.ok_or_else(|| ListenerError::StartupFailed {
            name: self.name().to_string(),
            reason: "already started".into(),
        })?;

        while let Some(incoming) = receiver.recv().await {
            callback.fire(incoming).await;
        }
        tracing::debug!("All channel senders dropped");
        Ok(())
    }
}
