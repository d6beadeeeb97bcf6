//! Regex-backed command processors.
//!
//! A [`CommandPattern`] validates a command word at construction time and
//! compiles it into a full-line, case-insensitive pattern. [`RegexProcessor`]
//! pairs a pattern with a [`CommandHandler`] that receives the captured groups.

use std::collections::HashMap;
use std::sync::{LazyLock, Weak};

use async_trait::async_trait;
use regex::Regex;
use tracing::error;

use crate::context::Context;
use crate::error::{ConfigError, FlowError};
use crate::pipeline::flow::FlowTable;
use crate::pipeline::types::{HelpEntry, Incoming, MessagePayload, Payload};
use crate::processors::Processor;

/// Default message pattern: the bare command on its own line.
pub const DEFAULT_MESSAGE_PATTERN: &str = r"^\s*{command}\s*$";

static VALID_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!?\w[\w ]*$").expect("valid command regex"));

/// A validated command word and the compiled message pattern around it.
#[derive(Debug, Clone)]
pub struct CommandPattern {
    command: String,
    regex: Regex,
}

impl CommandPattern {
    /// Compile `command` into the default full-line pattern.
    pub fn new(command: &str) -> Result<Self, ConfigError> {
        Self::with_pattern(command, DEFAULT_MESSAGE_PATTERN)
    }

    /// Compile `command` into a custom pattern.
    ///
    /// `pattern` must contain `{command}`, which is replaced by the escaped
    /// command. It may add capture groups, e.g.
    /// `^\s*{command}\s+(?P<entity>\S+)\s*$`.
    pub fn with_pattern(command: &str, pattern: &str) -> Result<Self, ConfigError> {
        let command = command.trim().to_lowercase();
        if command.is_empty() {
            return Err(ConfigError::InvalidCommand {
                command,
                reason: "command is empty".into(),
            });
        }
        if !VALID_COMMAND.is_match(&command) {
            return Err(ConfigError::InvalidCommand {
                command,
                reason: "only word characters and spaces are allowed".into(),
            });
        }
        if !pattern.contains("{command}") {
            return Err(ConfigError::InvalidPattern {
                command,
                reason: "pattern has no {command} placeholder".into(),
            });
        }

        let source = format!("(?i){}", pattern.replace("{command}", &regex::escape(&command)));
        let regex = Regex::new(&source).map_err(|e| ConfigError::InvalidPattern {
            command: command.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self { command, regex })
    }

    /// The normalized command word.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Match message text against the pattern.
    pub fn captures(&self, text: &str) -> Option<CommandMatch> {
        let caps = self.regex.captures(text)?;
        let groups = caps
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_string()))
            .collect();
        let named = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
            .collect();
        Some(CommandMatch {
            text: text.to_string(),
            groups,
            named,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Owned capture groups of a matched command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandMatch {
    /// The full message text.
    pub text: String,
    /// Positional groups, 1-based in the pattern, 0-based here.
    pub groups: Vec<Option<String>>,
    /// Named groups that participated in the match.
    pub named: HashMap<String, String>,
}

impl CommandMatch {
    /// Positional group by pattern index (1-based).
    pub fn group(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .and_then(|g| g.as_deref())
    }

    /// Named group.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }
}

/// Command-specific extraction behind a [`RegexProcessor`].
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Description shown in help listings.
    fn description(&self) -> &str {
        ""
    }

    /// Usage line shown in help listings; defaults to the command.
    fn usage(&self, command: &str) -> String {
        command.to_string()
    }

    /// Whether the command is listed in help at all.
    fn listed(&self) -> bool {
        true
    }

    /// Produce the result for a matched message.
    async fn handle(
        &self,
        ctx: Context,
        message: MessagePayload,
        matched: CommandMatch,
    ) -> Result<Payload, FlowError>;

    /// Receive the flow table handle; see [`Processor::attach`].
    fn attach(&self, _flows: Weak<FlowTable>) {}
}

/// Processor matching a command pattern against message text.
pub struct RegexProcessor<H> {
    pattern: CommandPattern,
    handler: H,
}

impl<H: CommandHandler> RegexProcessor<H> {
    /// Processor for `command` with the default full-line pattern.
    pub fn new(command: &str, handler: H) -> Result<Self, ConfigError> {
        Ok(Self::from_pattern(CommandPattern::new(command)?, handler))
    }

    /// Processor for `command` with a custom pattern.
    pub fn with_pattern(command: &str, pattern: &str, handler: H) -> Result<Self, ConfigError> {
        Ok(Self::from_pattern(
            CommandPattern::with_pattern(command, pattern)?,
            handler,
        ))
    }

    /// Processor around an already compiled pattern.
    pub fn from_pattern(pattern: CommandPattern, handler: H) -> Self {
        Self { pattern, handler }
    }

    pub fn command(&self) -> &str {
        self.pattern.command()
    }

    pub fn pattern(&self) -> &CommandPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

#[async_trait]
impl<H: CommandHandler> Processor for RegexProcessor<H> {
    fn name(&self) -> &str {
        self.pattern.command()
    }

    async fn can_process(&self, incoming: &Incoming) -> bool {
        match incoming {
            Incoming::Message(m) => self.pattern.is_match(&m.text),
            _ => false,
        }
    }

    async fn process(&self, ctx: Context, incoming: Incoming) -> Result<Payload, FlowError> {
        let not_applicable = |kind: &str| {
            error!(
                processor = self.command(),
                kind, "Processor invoked on a payload it does not match"
            );
            FlowError::NotApplicable {
                processor: self.command().to_string(),
                kind: kind.to_string(),
            }
        };

        let message = match incoming {
            Incoming::Message(m) => m,
            other => return Err(not_applicable(other.kind())),
        };
        let matched = self
            .pattern
            .captures(&message.text)
            .ok_or_else(|| not_applicable("message"))?;

        self.handler.handle(ctx, message, matched).await
    }

    async fn help(&self) -> Option<HelpEntry> {
        if !self.handler.listed() {
            return None;
        }
        let command = self.pattern.command();
        Some(HelpEntry::new(
            command,
            self.handler.usage(command),
            self.handler.description(),
        ))
    }

    fn attach(&self, flows: Weak<FlowTable>) {
        self.handler.attach(flows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        fn description(&self) -> &str {
            "Echoes the argument."
        }

        fn usage(&self, command: &str) -> String {
            format!("{command} <text>")
        }

        async fn handle(
            &self,
            _ctx: Context,
            _message: MessagePayload,
            matched: CommandMatch,
        ) -> Result<Payload, FlowError> {
            Ok(Payload::Text(matched.name("arg").unwrap_or_default().to_string()))
        }
    }

    fn echo() -> RegexProcessor<Echo> {
        RegexProcessor::with_pattern("echo", r"^\s*{command}\s+(?P<arg>.+?)\s*$", Echo).unwrap()
    }

    fn message(text: &str) -> Incoming {
        Incoming::message(text, "general", "alice", true)
    }

    #[test]
    fn rejects_invalid_commands() {
        assert!(matches!(CommandPattern::new(""), Err(ConfigError::InvalidCommand { .. })));
        assert!(matches!(CommandPattern::new("   "), Err(ConfigError::InvalidCommand { .. })));
        assert!(matches!(CommandPattern::new("rm -rf"), Err(ConfigError::InvalidCommand { .. })));
        assert!(matches!(CommandPattern::new("a.*"), Err(ConfigError::InvalidCommand { .. })));
    }

    #[test]
    fn accepts_words_digits_spaces_and_bang() {
        assert_eq!(CommandPattern::new("  Version ").unwrap().command(), "version");
        assert_eq!(CommandPattern::new("!help").unwrap().command(), "!help");
        assert_eq!(CommandPattern::new("lights 2").unwrap().command(), "lights 2");
    }

    #[test]
    fn pattern_requires_placeholder() {
        assert!(matches!(
            CommandPattern::with_pattern("echo", r"^echo$"),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn default_pattern_is_full_line_and_case_insensitive() {
        let pattern = CommandPattern::new("version").unwrap();
        assert!(pattern.is_match("version"));
        assert!(pattern.is_match("  VERSION   "));
        assert!(!pattern.is_match("version please"));
        assert!(!pattern.is_match("the version"));
    }

    #[test]
    fn captures_positional_and_named_groups() {
        let pattern = CommandPattern::with_pattern("turn", r"^\s*{command}\s+(on|off)\s+(?P<entity>\S+)\s*$").unwrap();
        let matched = pattern.captures("turn on light.kitchen").unwrap();
        assert_eq!(matched.group(1), Some("on"));
        assert_eq!(matched.group(2), Some("light.kitchen"));
        assert_eq!(matched.group(0), None);
        assert_eq!(matched.name("entity"), Some("light.kitchen"));
    }

    #[tokio::test]
    async fn can_process_only_matching_messages() {
        let dut = echo();
        assert!(dut.can_process(&message("echo hello world")).await);
        assert!(!dut.can_process(&message("echo")).await);
        assert!(!dut.can_process(&Incoming::Empty).await);
        assert!(!dut.can_process(&Incoming::unknown_command("echo hi")).await);
        assert!(!dut.can_process(&Incoming::error("echo hi", "")).await);
    }

    #[tokio::test]
    async fn process_hands_groups_to_handler() {
        let dut = echo();
        let incoming = message("  ECHO hello world ");
        let out = dut.process(Context::new(incoming.clone()), incoming).await.unwrap();
        assert_eq!(out, Payload::Text("hello world".into()));
    }

    #[tokio::test]
    async fn process_without_match_is_invariant_violation() {
        let dut = echo();
        let incoming = message("something else");
        let err = dut.process(Context::new(incoming.clone()), incoming).await.unwrap_err();
        assert!(matches!(err, FlowError::NotApplicable { .. }));

        let err = dut
            .process(Context::new(Incoming::Empty), Incoming::Empty)
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::NotApplicable { ref kind, .. } if kind == "empty"));
    }

    #[tokio::test]
    async fn help_uses_handler_metadata() {
        let help = echo().help().await.unwrap();
        assert_eq!(help, HelpEntry::new("echo", "echo <text>", "Echoes the argument."));
    }
}
