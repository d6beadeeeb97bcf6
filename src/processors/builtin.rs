//! Built-in processors: help, version, and the two fallback sentinels.

use std::sync::{OnceLock, Weak};

use async_trait::async_trait;
use tracing::{debug, error};

use crate::context::Context;
use crate::error::{ConfigError, FlowError};
use crate::pipeline::flow::FlowTable;
use crate::pipeline::types::{HelpEntry, Incoming, MessagePayload, Payload};
use crate::processors::Processor;
use crate::processors::command::{CommandHandler, CommandMatch, CommandPattern, RegexProcessor};

/// Version reported by [`Version`] unless overridden.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn not_applicable(processor: &str, incoming: &Incoming) -> FlowError {
    error!(
        processor,
        kind = incoming.kind(),
        "Processor invoked on a payload it does not match"
    );
    FlowError::NotApplicable {
        processor: processor.to_string(),
        kind: incoming.kind().to_string(),
    }
}

// ── Help ────────────────────────────────────────────────────────────

/// `help`: lists the help entries of every flow on the same orchestrator.
pub type Help = RegexProcessor<HelpHandler>;

pub struct HelpHandler {
    command: String,
    flows: OnceLock<Weak<FlowTable>>,
}

impl HelpHandler {
    const DESCRIPTION: &'static str = "Shows this help page.";
}

impl Help {
    pub const DEFAULT_COMMAND: &'static str = "help";

    pub fn with_command(command: &str) -> Result<Self, ConfigError> {
        let pattern = CommandPattern::new(command)?;
        let handler = HelpHandler {
            command: pattern.command().to_string(),
            flows: OnceLock::new(),
        };
        Ok(Self::from_pattern(pattern, handler))
    }
}

impl Default for Help {
    fn default() -> Self {
        Self::with_command(Self::DEFAULT_COMMAND).expect("default help command is valid")
    }
}

#[async_trait]
impl CommandHandler for HelpHandler {
    fn description(&self) -> &str {
        Self::DESCRIPTION
    }

    async fn handle(
        &self,
        _ctx: Context,
        _message: MessagePayload,
        _matched: CommandMatch,
    ) -> Result<Payload, FlowError> {
        let entries = match self.flows.get().and_then(Weak::upgrade) {
            Some(table) => table.help_entries().await,
            None => {
                debug!("Help processor is not attached to an orchestrator");
                vec![HelpEntry::new(&self.command, &self.command, Self::DESCRIPTION)]
            }
        };
        Ok(Payload::Help(entries))
    }

    fn attach(&self, flows: Weak<FlowTable>) {
        if self.flows.set(flows).is_err() {
            debug!("Help processor already attached; keeping the first flow table");
        }
    }
}

// ── Version ─────────────────────────────────────────────────────────

/// `version`: answers with a static version string.
pub type Version = RegexProcessor<VersionHandler>;

pub struct VersionHandler {
    version: String,
}

impl Version {
    pub const DEFAULT_COMMAND: &'static str = "version";

    pub fn with_command(command: &str) -> Result<Self, ConfigError> {
        Self::new(
            command,
            VersionHandler {
                version: VERSION.to_string(),
            },
        )
    }

    /// Report a different version string.
    pub fn with_version(self, version: impl Into<String>) -> Self {
        let pattern = self.pattern().clone();
        Self::from_pattern(
            pattern,
            VersionHandler {
                version: version.into(),
            },
        )
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::with_command(Self::DEFAULT_COMMAND).expect("default version command is valid")
    }
}

#[async_trait]
impl CommandHandler for VersionHandler {
    fn description(&self) -> &str {
        "Shows the version of homebot."
    }

    async fn handle(
        &self,
        _ctx: Context,
        _message: MessagePayload,
        _matched: CommandMatch,
    ) -> Result<Payload, FlowError> {
        Ok(Payload::Text(self.version.clone()))
    }
}

// ── Fallback sentinels ──────────────────────────────────────────────

/// Matches only error payloads and passes them through unchanged.
///
/// Register a flow with this processor to act on faults of other flows.
#[derive(Debug, Default)]
pub struct Error;

#[async_trait]
impl Processor for Error {
    fn name(&self) -> &str {
        "error"
    }

    async fn can_process(&self, incoming: &Incoming) -> bool {
        incoming.is_error()
    }

    async fn process(&self, _ctx: Context, incoming: Incoming) -> Result<Payload, FlowError> {
        if !incoming.is_error() {
            return Err(not_applicable(self.name(), &incoming));
        }
        Ok(Payload::Incoming(incoming))
    }
}

/// Matches only unknown-command payloads and passes them through unchanged.
#[derive(Debug, Default)]
pub struct UnknownCommand;

#[async_trait]
impl Processor for UnknownCommand {
    fn name(&self) -> &str {
        "unknown_command"
    }

    async fn can_process(&self, incoming: &Incoming) -> bool {
        incoming.is_unknown_command()
    }

    async fn process(&self, _ctx: Context, incoming: Incoming) -> Result<Payload, FlowError> {
        if !incoming.is_unknown_command() {
            return Err(not_applicable(self.name(), &incoming));
        }
        Ok(Payload::Incoming(incoming))
    }
}
