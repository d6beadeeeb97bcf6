//! Replying to the channel a message came from.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::actions::Action;
use crate::context::Context;
use crate::error::{ConfigError, FlowError};
use crate::pipeline::types::{Payload, RichMessage};

/// Transport that delivers a message to a chat channel.
#[async_trait]
pub trait MessageSink: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, channel: &str, message: RichMessage) -> Result<(), FlowError>;
}

/// Posts the payload back to the channel of the incoming message.
pub struct SendMessage {
    sink: Arc<dyn MessageSink>,
}

impl SendMessage {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Action for SendMessage {
    fn name(&self) -> &str {
        "send_message"
    }

    async fn execute(&self, ctx: Context, payload: Payload) -> Result<(), FlowError> {
        let channel = ctx
            .incoming
            .origin()
            .ok_or_else(|| FlowError::NoDestination {
                kind: ctx.incoming.kind().to_string(),
            })?;

        let message = match payload {
            Payload::Rich(message) => message,
            Payload::Text(text) => RichMessage::text(text),
            other => RichMessage::text(other.to_string()),
        };

        tracing::debug!(sink = self.sink.name(), channel, "Sending reply");
        self.sink.send(channel, message).await
    }
}

// ── Sinks ───────────────────────────────────────────────────────────

/// Writes replies to stdout, for the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

#[async_trait]
impl MessageSink for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send(&self, _channel: &str, message: RichMessage) -> Result<(), FlowError> {
        println!("\n{}\n", message.text);
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    channel: &'a str,
    #[serde(flatten)]
    message: &'a RichMessage,
}

/// POSTs replies as JSON to a chat webhook.
///
/// Body: `{"channel": ..., "text": ..., "blocks"?: [...], "attachments"?: [...]}`.
pub struct WebhookSink {
    url: String,
    token: Option<SecretString>,
    timeout: Duration,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(
        url: impl Into<String>,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "webhook client".into(),
                message: e.to_string(),
            })?;
        Ok(Self {
            url: url.into(),
            token,
            timeout,
            client,
        })
    }
}

#[async_trait]
impl MessageSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, channel: &str, message: RichMessage) -> Result<(), FlowError> {
        let body = WebhookBody {
            channel,
            message: &message,
        };
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FlowError::SendTimeout {
                    channel: channel.to_string(),
                    timeout: self.timeout,
                }
            } else {
                FlowError::SendFailed {
                    channel: channel.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            tracing::warn!(channel, status = %status, "Webhook rejected message");
            return Err(FlowError::SendFailed {
                channel: channel.to_string(),
                reason: format!("webhook returned {status}: {detail}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{HelpEntry, Incoming};
    use mockito::Matcher;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, RichMessage)>>,
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, channel: &str, message: RichMessage) -> Result<(), FlowError> {
            self.sent.lock().await.push((channel.to_string(), message));
            Ok(())
        }
    }

    fn message_ctx() -> Context {
        Context::new(Incoming::message("help", "general", "alice", true))
    }

    #[tokio::test]
    async fn replies_to_origin_channel() {
        let sink = Arc::new(RecordingSink::default());
        let action = SendMessage::new(sink.clone());

        action.execute(message_ctx(), Payload::from("pong")).await.unwrap();
        let rich = RichMessage {
            text: "fallback".into(),
            blocks: Some(vec![serde_json::json!({"type": "divider"})]),
            attachments: None,
        };
        action.execute(message_ctx(), Payload::Rich(rich.clone())).await.unwrap();
        action
            .execute(
                message_ctx(),
                Payload::Help(vec![HelpEntry::new("help", "help", "Shows help.")]),
            )
            .await
            .unwrap();

        let sent = sink.sent.lock().await;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], ("general".to_string(), RichMessage::text("pong")));
        assert_eq!(sent[1].1, rich);
        assert!(sent[2].1.text.contains("Shows help."));
    }

    #[tokio::test]
    async fn no_destination_without_message() {
        let action = SendMessage::new(Arc::new(RecordingSink::default()));
        let err = action
            .execute(Context::new(Incoming::Empty), Payload::from("pong"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::NoDestination { ref kind } if kind == "empty"));
    }

    #[tokio::test]
    async fn webhook_posts_json_with_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("authorization", "Bearer s3cret")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({
                "channel": "general",
                "text": "hello",
            })))
            .with_status(200)
            .create_async()
            .await;

        let sink = WebhookSink::new(
            format!("{}/hook", server.url()),
            Some(SecretString::from("s3cret")),
            Duration::from_secs(5),
        )
        .unwrap();
        sink.send("general", RichMessage::text("hello")).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn webhook_error_status_is_send_failure() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("authorization", Matcher::Missing)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let sink = WebhookSink::new(format!("{}/hook", server.url()), None, Duration::from_secs(5)).unwrap();
        let err = sink.send("general", RichMessage::text("hello")).await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::SendFailed { ref channel, ref reason } if channel == "general" && reason.contains("boom")
        ));

        mock.assert_async().await;
    }
}
