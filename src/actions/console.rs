//! Diagnostic sinks.

use async_trait::async_trait;
use tracing::Level;

use crate::actions::Action;
use crate::context::Context;
use crate::error::FlowError;
use crate::pipeline::types::Payload;

/// Prints the context and payload to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

#[async_trait]
impl Action for Console {
    fn name(&self) -> &str {
        "console"
    }

    async fn execute(&self, ctx: Context, payload: Payload) -> Result<(), FlowError> {
        println!("Context: {:?}\nPayload: {}", ctx.incoming, payload);
        Ok(())
    }
}

/// Emits the payload as a tracing event.
#[derive(Debug, Clone, Copy)]
pub struct Log {
    level: Level,
}

impl Log {
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    pub fn info() -> Self {
        Self::new(Level::INFO)
    }

    pub fn warn() -> Self {
        Self::new(Level::WARN)
    }
}

impl Default for Log {
    fn default() -> Self {
        Self::info()
    }
}

#[async_trait]
impl Action for Log {
    fn name(&self) -> &str {
        "log"
    }

    async fn execute(&self, ctx: Context, payload: Payload) -> Result<(), FlowError> {
        let dispatch_id = ctx.dispatch_id;
        let incoming = ctx.incoming.kind();
        let kind = payload.kind();
        // tracing levels must be known at the call site
        match self.level {
            Level::ERROR => tracing::error!(%dispatch_id, incoming, kind = %kind, "{payload}"),
            Level::WARN => tracing::warn!(%dispatch_id, incoming, kind = %kind, "{payload}"),
            Level::INFO => tracing::info!(%dispatch_id, incoming, kind = %kind, "{payload}"),
            Level::DEBUG => tracing::debug!(%dispatch_id, incoming, kind = %kind, "{payload}"),
            _ => tracing::trace!(%dispatch_id, incoming, kind = %kind, "{payload}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::Incoming;

    #[tokio::test]
    async fn sinks_never_fail() {
        let ctx = Context::new(Incoming::message("ping", "general", "alice", true));
        assert!(Console.execute(ctx.clone(), Payload::from("pong")).await.is_ok());
        for log in [Log::info(), Log::warn(), Log::new(Level::TRACE)] {
            assert!(log.execute(ctx.clone(), Payload::from("pong")).await.is_ok());
        }
    }
}
