//! String interpolation formatter.

use async_trait::async_trait;

use crate::context::Context;
use crate::error::FlowError;
use crate::formatters::Formatter;
use crate::formatters::interpolate::interpolate;
use crate::pipeline::types::Payload;

/// Renders a format template against the context and payload.
///
/// `StringFormat::new("Homebot version `{payload}` is up and running...")`
pub struct StringFormat {
    template: String,
}

impl StringFormat {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

#[async_trait]
impl Formatter for StringFormat {
    fn name(&self) -> &str {
        "string_format"
    }

    async fn format(&self, ctx: Context, payload: Payload) -> Result<Payload, FlowError> {
        Ok(Payload::Text(interpolate(&self.template, &ctx, &payload)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemplateError;
    use crate::pipeline::types::Incoming;

    fn ctx() -> Context {
        Context::new(Incoming::message("status", "general", "alice", true))
    }

    #[tokio::test]
    async fn formats_number_payload() {
        let dut = StringFormat::new("This is the number: {payload}");
        let out = dut
            .format(ctx(), Payload::Value(serde_json::json!(42)))
            .await
            .unwrap();
        assert_eq!(out, Payload::Text("This is the number: 42".into()));
    }

    #[tokio::test]
    async fn formats_keyed_payload() {
        let dut = StringFormat::new("Value: {payload['key']}");
        let out = dut
            .format(ctx(), Payload::Value(serde_json::json!({"key": "value"})))
            .await
            .unwrap();
        assert_eq!(out.to_string(), "Value: value");
    }

    #[tokio::test]
    async fn reads_original_message_from_context() {
        let dut = StringFormat::new("Processing of `{ctx.incoming.text}` failed: `{payload.error_message}`");
        let out = dut
            .format(ctx(), Payload::Incoming(Incoming::error("timeout", "")))
            .await
            .unwrap();
        assert_eq!(out.to_string(), "Processing of `status` failed: `timeout`");
    }

    #[tokio::test]
    async fn unresolved_field_is_a_fault() {
        let dut = StringFormat::new("{payload.missing}");
        let err = dut.format(ctx(), Payload::from("text")).await.unwrap_err();
        assert!(matches!(err, FlowError::Template(TemplateError::Unresolved { .. })));
    }
}
