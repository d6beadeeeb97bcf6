//! Processors: decide whether a payload is theirs and turn it into a result.

pub mod builtin;
pub mod command;

use std::sync::Weak;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::FlowError;
use crate::pipeline::flow::FlowTable;
use crate::pipeline::types::{HelpEntry, Incoming, Payload};

pub use builtin::{Error, Help, HelpHandler, UnknownCommand, Version, VersionHandler};
pub use command::{CommandHandler, CommandMatch, CommandPattern, RegexProcessor};

/// First stage of a flow.
///
/// The orchestrator calls [`Processor::can_process`] once per flow and
/// incoming payload, and only calls [`Processor::process`] when it returned
/// true.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Processor name for logging.
    fn name(&self) -> &str;

    /// Whether this processor handles the payload. Must be cheap and free of
    /// side effects.
    async fn can_process(&self, incoming: &Incoming) -> bool;

    /// Turn the payload into a result.
    async fn process(&self, ctx: Context, incoming: Incoming) -> Result<Payload, FlowError>;

    /// Entry for help listings. `None` hides the processor.
    async fn help(&self) -> Option<HelpEntry> {
        None
    }

    /// Receive a handle to the flow table this processor was registered in.
    ///
    /// Called once when the orchestrator is built.
    fn attach(&self, _flows: Weak<FlowTable>) {}
}
