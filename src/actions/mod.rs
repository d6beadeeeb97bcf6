//! Actions: the side effects at the end of a flow.
//!
//! All actions of a flow run concurrently with the same formatted payload.

pub mod console;
pub mod send;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::FlowError;
use crate::pipeline::types::Payload;

pub use console::{Console, Log};
pub use send::{MessageSink, SendMessage, StdoutSink, WebhookSink};

/// A side-effecting consumer of a flow's result.
///
/// Actions that cache shared state (connections, counters) must synchronize
/// it themselves; the same action may run for overlapping dispatches.
#[async_trait]
pub trait Action: Send + Sync {
    /// Action name for logging.
    fn name(&self) -> &str;

    /// Perform the side effect.
    async fn execute(&self, ctx: Context, payload: Payload) -> Result<(), FlowError>;
}
