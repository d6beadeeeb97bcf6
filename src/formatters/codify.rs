//! Code block wrapper.

use async_trait::async_trait;

use crate::context::Context;
use crate::error::FlowError;
use crate::formatters::Formatter;
use crate::pipeline::types::Payload;

/// Wraps the payload text in a fenced code block.
///
/// Rich messages keep their blocks and attachments; only `text` is wrapped.
pub struct Codify {
    fence: String,
}

impl Codify {
    pub fn new() -> Self {
        Self {
            fence: "```".to_string(),
        }
    }

    /// Use a different fence, e.g. `"`"` for inline code.
    pub fn with_fence(mut self, fence: impl Into<String>) -> Self {
        self.fence = fence.into();
        self
    }

    fn wrap(&self, text: &str) -> String {
        format!("{fence}{text}{fence}", fence = self.fence)
    }
}

impl Default for Codify {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Formatter for Codify {
    fn name(&self) -> &str {
        "codify"
    }

    async fn format(&self, _ctx: Context, payload: Payload) -> Result<Payload, FlowError> {
        Ok(match payload {
            Payload::Rich(mut message) => {
                message.text = self.wrap(&message.text);
                Payload::Rich(message)
            }
            other => Payload::Text(self.wrap(&other.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{Incoming, RichMessage};

    fn ctx() -> Context {
        Context::new(Incoming::message("help", "general", "alice", true))
    }

    #[tokio::test]
    async fn wraps_text() {
        let out = Codify::new().format(ctx(), Payload::from("String")).await.unwrap();
        assert_eq!(out, Payload::Text("```String```".into()));
    }

    #[tokio::test]
    async fn wraps_rich_text_only() {
        let message = RichMessage {
            text: "String".into(),
            blocks: Some(vec![serde_json::json!({"type": "divider"})]),
            attachments: None,
        };
        let out = Codify::new().format(ctx(), Payload::Rich(message)).await.unwrap();
        match out {
            Payload::Rich(m) => {
                assert_eq!(m.text, "```String```");
                assert_eq!(m.blocks.unwrap().len(), 1);
                assert!(m.attachments.is_none());
            }
            other => panic!("Expected Rich, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stringifies_other_payloads() {
        let out = Codify::new()
            .with_fence("`")
            .format(ctx(), Payload::Value(serde_json::json!(7)))
            .await
            .unwrap();
        assert_eq!(out.to_string(), "`7`");
    }
}
