//! Flows: one processor bound to its formatter chain and action set.

use std::sync::Arc;

use crate::actions::{Action, Log};
use crate::error::ConfigError;
use crate::formatters::Formatter;
use crate::pipeline::types::HelpEntry;
use crate::processors::Processor;

/// A processor with 0..n formatters and 1..n actions.
#[derive(Clone)]
pub struct Flow {
    pub(crate) processor: Arc<dyn Processor>,
    pub(crate) formatters: Vec<Arc<dyn Formatter>>,
    pub(crate) actions: Vec<Arc<dyn Action>>,
}

impl Flow {
    /// Create a flow. Fails if `actions` is empty.
    pub fn new(
        processor: Arc<dyn Processor>,
        formatters: Vec<Arc<dyn Formatter>>,
        actions: Vec<Arc<dyn Action>>,
    ) -> Result<Self, ConfigError> {
        if actions.is_empty() {
            return Err(ConfigError::NoActions {
                processor: processor.name().to_string(),
            });
        }
        Ok(Self {
            processor,
            formatters,
            actions,
        })
    }

    /// Start building a flow around `processor`.
    pub fn builder(processor: impl Processor + 'static) -> FlowBuilder {
        FlowBuilder {
            processor: Arc::new(processor),
            formatters: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn processor(&self) -> &Arc<dyn Processor> {
        &self.processor
    }

    pub fn formatters(&self) -> &[Arc<dyn Formatter>] {
        &self.formatters
    }

    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    /// Processor name, used as the flow's name in logs.
    pub fn name(&self) -> &str {
        self.processor.name()
    }
}

/// Builder for [`Flow`].
pub struct FlowBuilder {
    processor: Arc<dyn Processor>,
    formatters: Vec<Arc<dyn Formatter>>,
    actions: Vec<Arc<dyn Action>>,
}

impl FlowBuilder {
    /// Append a formatter to the chain.
    pub fn formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatters.push(Arc::new(formatter));
        self
    }

    /// Add an action.
    pub fn action(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    /// Add an already shared action, e.g. one sender used by several flows.
    pub fn shared_action(mut self, action: Arc<dyn Action>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn build(self) -> Result<Flow, ConfigError> {
        Flow::new(self.processor, self.formatters, self.actions)
    }
}

/// The orchestrator's immutable list of flows, in registration order.
///
/// Processors get a weak handle to it at registration time.
pub struct FlowTable {
    flows: Vec<Flow>,
}

impl FlowTable {
    pub(crate) fn new(flows: Vec<Flow>) -> Self {
        Self { flows }
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Help entries of all flows that expose one, in registration order.
    pub async fn help_entries(&self) -> Vec<HelpEntry> {
        let mut entries = Vec::with_capacity(self.flows.len());
        for flow in &self.flows {
            if let Some(entry) = flow.processor.help().await {
                entries.push(entry);
            }
        }
        entries
    }
}

// ── Error flow ──────────────────────────────────────────────────────

/// Default message for payloads nobody could handle.
pub const DEFAULT_UNKNOWN_COMMAND_MESSAGE: &str =
    "No processor is able to handle the message: {ctx.incoming.text}";

/// Default message for faults nobody could report.
pub const DEFAULT_ERROR_MESSAGE: &str =
    "Processing of '{ctx.incoming.text}' failed: {payload.error_message}";

/// Last-resort sink for fallback payloads that no flow resolved.
///
/// Receives unknown-command payloads nobody handled and faults raised while
/// an error was already being handled. The matching message template is
/// rendered first, then piped through the formatters and actions.
#[derive(Clone)]
pub struct ErrorFlow {
    pub(crate) formatters: Vec<Arc<dyn Formatter>>,
    pub(crate) actions: Vec<Arc<dyn Action>>,
    pub(crate) unknown_command_message: String,
    pub(crate) error_message: String,
}

impl ErrorFlow {
    /// Create an error flow. Fails if `actions` is empty.
    pub fn new(
        formatters: Vec<Arc<dyn Formatter>>,
        actions: Vec<Arc<dyn Action>>,
    ) -> Result<Self, ConfigError> {
        if actions.is_empty() {
            return Err(ConfigError::NoActions {
                processor: "error_flow".into(),
            });
        }
        Ok(Self {
            formatters,
            actions,
            unknown_command_message: DEFAULT_UNKNOWN_COMMAND_MESSAGE.to_string(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
        })
    }

    pub fn with_unknown_command_message(mut self, template: impl Into<String>) -> Self {
        self.unknown_command_message = template.into();
        self
    }

    pub fn with_error_message(mut self, template: impl Into<String>) -> Self {
        self.error_message = template.into();
        self
    }
}

impl Default for ErrorFlow {
    /// No formatting, log at WARN.
    fn default() -> Self {
        Self {
            formatters: Vec::new(),
            actions: vec![Arc::new(Log::warn())],
            unknown_command_message: DEFAULT_UNKNOWN_COMMAND_MESSAGE.to_string(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
        }
    }
}
