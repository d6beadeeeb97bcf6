//! Stdin listener: one message per line, for local testing.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::ListenerError;
use crate::listeners::{Listener, ListenerCallback};
use crate::pipeline::types::Incoming;

pub const CLI_ORIGIN: &str = "cli";
pub const CLI_USER: &str = "local-user";

const PROMPT: &[u8] = b"> ";

/// Reads stdin line by line until EOF.
#[derive(Debug, Default)]
pub struct StdinListener {
    callback: Option<ListenerCallback>,
}

impl StdinListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire one message per non-empty line, prompting before every read.
    async fn read_lines<R, W>(&self, reader: R, mut prompt: W) -> Result<(), ListenerError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let callback = self.callback.as_ref().ok_or_else(|| ListenerError::NoCallback {
            name: self.name().to_string(),
        })?;

        let mut lines = reader.lines();
        loop {
            prompt.write_all(PROMPT).await?;
            prompt.flush().await?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            callback
                .fire(Incoming::message(line, CLI_ORIGIN, CLI_USER, true))
                .await;
        }
        tracing::debug!("Stdin closed");
        Ok(())
    }
}

#[async_trait]
impl Listener for StdinListener {
    fn name(&self) -> &str {
        "stdin"
    }

    fn set_callback(&mut self, callback: ListenerCallback) {
        self.callback = Some(callback);
    }

    async fn start(&self) -> Result<(), ListenerError> {
        self.read_lines(BufReader::new(tokio::io::stdin()), tokio::io::stderr())
            .await
    }
}
