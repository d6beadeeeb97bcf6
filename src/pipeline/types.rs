//! Shared types for the dispatch pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Incoming payload ────────────────────────────────────────────────

/// A message posted to the bot by a listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Message body with any leading bot mention stripped.
    pub text: String,
    /// Channel the message was posted in; replies go back here.
    pub origin: String,
    /// User that posted the message.
    pub origin_user: String,
    /// Whether the bot was addressed directly.
    #[serde(default)]
    pub direct_mention: bool,
}

/// A fault raised while a flow was running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error_message: String,
    pub trace: String,
}

/// A message that no flow claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownCommandPayload {
    pub command: String,
}

/// The unit a listener hands to the orchestrator.
///
/// `Error` and `UnknownCommand` are only ever synthesized by the orchestrator
/// during its fallback cycles. Every pipeline stage receives its own clone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Incoming {
    Message(MessagePayload),
    Error(ErrorPayload),
    UnknownCommand(UnknownCommandPayload),
    #[default]
    Empty,
}

impl Incoming {
    /// Build a message payload.
    pub fn message(
        text: impl Into<String>,
        origin: impl Into<String>,
        origin_user: impl Into<String>,
        direct_mention: bool,
    ) -> Self {
        Self::Message(MessagePayload {
            text: text.into(),
            origin: origin.into(),
            origin_user: origin_user.into(),
            direct_mention,
        })
    }

    /// Build an error payload.
    pub fn error(error_message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            error_message: error_message.into(),
            trace: trace.into(),
        })
    }

    /// Build an unknown-command payload.
    pub fn unknown_command(command: impl Into<String>) -> Self {
        Self::UnknownCommand(UnknownCommandPayload {
            command: command.into(),
        })
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Error(_) => "error",
            Self::UnknownCommand(_) => "unknown_command",
            Self::Empty => "empty",
        }
    }

    /// Message text, if this is a message.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Message(m) => Some(&m.text),
            _ => None,
        }
    }

    /// Channel to reply to, if this payload carries one.
    pub fn origin(&self) -> Option<&str> {
        match self {
            Self::Message(m) => Some(&m.origin),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn is_unknown_command(&self) -> bool {
        matches!(self, Self::UnknownCommand(_))
    }
}

impl fmt::Display for Incoming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(m) => write!(f, "{}", m.text),
            Self::Error(e) => write!(f, "{}", e.error_message),
            Self::UnknownCommand(u) => write!(f, "{}", u.command),
            Self::Empty => Ok(()),
        }
    }
}

// ── Help entries ────────────────────────────────────────────────────

/// Help listing entry contributed by a processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpEntry {
    pub command: String,
    pub usage: String,
    pub description: String,
}

impl HelpEntry {
    pub fn new(
        command: impl Into<String>,
        usage: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            usage: usage.into(),
            description: description.into(),
        }
    }
}

// ── Rich message ────────────────────────────────────────────────────

/// A structured chat message: text plus optional rich parts.
///
/// Blocks and attachments are opaque to the bot and forwarded as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichMessage {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<serde_json::Value>>,
}

impl RichMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

// ── Stage payload ───────────────────────────────────────────────────

/// The value handed from one pipeline stage to the next.
///
/// Serializes untagged so templates can address fields directly
/// (`{payload.error_message}`, `{payload[0].command}`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Incoming(Incoming),
    Text(String),
    Help(Vec<HelpEntry>),
    Rich(RichMessage),
    Value(serde_json::Value),
}

impl Payload {
    /// Short label for logging and fault messages.
    pub fn kind(&self) -> String {
        match self {
            Self::Incoming(incoming) => format!("incoming:{}", incoming.kind()),
            Self::Text(_) => "text".into(),
            Self::Help(_) => "help".into(),
            Self::Rich(_) => "rich".into(),
            Self::Value(_) => "value".into(),
        }
    }

    /// Serialize into a JSON value for template lookups.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<Incoming> for Payload {
    fn from(incoming: Incoming) -> Self {
        Self::Incoming(incoming)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<HelpEntry>> for Payload {
    fn from(entries: Vec<HelpEntry>) -> Self {
        Self::Help(entries)
    }
}

impl From<RichMessage> for Payload {
    fn from(message: RichMessage) -> Self {
        Self::Rich(message)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incoming(incoming) => write!(f, "{incoming}"),
            Self::Text(text) => f.write_str(text),
            Self::Help(entries) => {
                let lines: Vec<String> = entries
                    .iter()
                    .map(|e| format!("{}: {}", e.usage, e.description))
                    .collect();
                f.write_str(&lines.join("\n"))
            }
            Self::Rich(message) => f.write_str(&message.text),
            Self::Value(serde_json::Value::String(s)) => f.write_str(s),
            Self::Value(value) => write!(f, "{value}"),
        }
    }
}
