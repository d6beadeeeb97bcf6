//! Error types for homebot.

use std::time::Duration;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),
}

/// Configuration-related errors.
///
/// Raised while the object graph is assembled; never during dispatch.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid command '{command}': {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("Invalid message pattern for command '{command}': {reason}")]
    InvalidPattern { command: String, reason: String },

    #[error("Flow for processor '{processor}' has no actions")]
    NoActions { processor: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load template {path}: {reason}")]
    TemplateLoad { path: String, reason: String },
}

/// Faults raised while a single flow runs.
///
/// The orchestrator recovers every one of these locally by turning it into an
/// error payload; none of them crash the process.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Processor {processor} invoked on a payload it cannot process ({kind})")]
    NotApplicable { processor: String, kind: String },

    #[error("{stage} {name} does not support payload {found}, expected {expected}")]
    UnsupportedPayload {
        stage: &'static str,
        name: String,
        expected: &'static str,
        found: String,
    },

    #[error("Incoming payload '{kind}' carries no destination channel")]
    NoDestination { kind: String },

    #[error("Failed to send message to {channel}: {reason}")]
    SendFailed { channel: String, reason: String },

    #[error("Send to {channel} timed out after {timeout:?}")]
    SendTimeout { channel: String, timeout: Duration },

    #[error("{failed} of {total} actions failed, first: {first}")]
    Actions {
        failed: usize,
        total: usize,
        first: Box<FlowError>,
    },

    #[error("{stage} {name} panicked: {message}")]
    Panicked {
        stage: &'static str,
        name: String,
        message: String,
    },

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlowError {
    /// Render the fault and its source chain, one cause per line.
    ///
    /// Stands in for a stack trace on synthesized error payloads.
    pub fn trace(&self) -> String {
        let mut trace = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            trace.push_str("\n  caused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }
        if let Self::Actions { first, .. } = self {
            trace.push_str("\n  first failure: ");
            trace.push_str(&first.trace());
        }
        trace
    }
}

/// Listener-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Listener {name} has no callback installed")]
    NoCallback { name: String },

    #[error("Listener {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the restricted template evaluator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("Unbalanced '{brace}' at offset {offset}")]
    Unbalanced { brace: char, offset: usize },

    #[error("Malformed placeholder '{placeholder}': {reason}")]
    Malformed { placeholder: String, reason: String },

    #[error("Unknown root '{root}' (expected 'ctx' or 'payload')")]
    UnknownRoot { root: String },

    #[error("'{path}' does not resolve: {reason}")]
    Unresolved { path: String, reason: String },

    #[error("Rendered template is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Rendered template is not a rich message: {0}")]
    NotRichMessage(String),

    #[error("Template engine failed: {0}")]
    Engine(String),
}

/// Asset and secret resolution errors.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("The asset directory could not be resolved. Probed: {probed:?}")]
    AssetDirNotFound { probed: Vec<String> },

    #[error("The template directory could not be resolved. Probed: {probed:?}")]
    TemplateDirNotFound { probed: Vec<String> },

    #[error("Template '{0}' is not a file")]
    TemplateNotFound(String),

    #[error("The secret '{0}' could not be resolved.")]
    SecretNotFound(String),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_includes_source_chain() {
        let inner = anyhow::anyhow!("socket closed").context("fetching schedule");
        let err = FlowError::Other(inner);
        let trace = err.trace();
        assert!(trace.starts_with("fetching schedule"));
        assert!(trace.contains("caused by: socket closed"));
    }

    #[test]
    fn trace_descends_into_first_action_failure() {
        let err = FlowError::Actions {
            failed: 1,
            total: 3,
            first: Box::new(FlowError::NoDestination {
                kind: "error".into(),
            }),
        };
        let trace = err.trace();
        assert!(trace.contains("1 of 3 actions failed"));
        assert!(trace.contains("first failure: Incoming payload 'error'"));
    }

    #[test]
    fn config_error_converts_into_top_level() {
        let err: Error = ConfigError::NoActions {
            processor: "version".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Flow for processor 'version' has no actions"
        );
    }
}
