//! End-to-end tests: payloads enter through a channel listener, run through
//! the public flow API and leave through a recording message sink.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::timeout;

use homebot::actions::{MessageSink, SendMessage};
use homebot::error::FlowError;
use homebot::formatters::{Codify, HelpTable, StringFormat};
use homebot::listeners::ChannelListener;
use homebot::pipeline::types::MessagePayload;
use homebot::processors::{self, CommandHandler, CommandMatch, Help, RegexProcessor, UnknownCommand, Version};
use homebot::{Context, ErrorFlow, Flow, Incoming, Orchestrator, Payload, RichMessage};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Sink that keeps everything it is asked to send.
#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    async fn texts(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|(_, text)| text.clone()).collect()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, channel: &str, message: RichMessage) -> Result<(), FlowError> {
        self.sent.lock().await.push((channel.to_string(), message.text));
        Ok(())
    }
}

/// `say <words>` echoes the words; `say` alone fails.
struct Say;

#[async_trait]
impl CommandHandler for Say {
    fn description(&self) -> &str {
        "Repeats what you say."
    }

    fn usage(&self, command: &str) -> String {
        format!("{command} <words>")
    }

    async fn handle(
        &self,
        _ctx: Context,
        _message: MessagePayload,
        matched: CommandMatch,
    ) -> Result<Payload, FlowError> {
        match matched.name("words") {
            Some(words) if !words.trim().is_empty() => Ok(Payload::from(words.trim())),
            _ => Err(anyhow::anyhow!("nothing to say").into()),
        }
    }
}

fn message(text: &str) -> Incoming {
    Incoming::message(text, "general", "alice", true)
}

fn flows(sink: Arc<RecordingSink>) -> Vec<Flow> {
    let reply = Arc::new(SendMessage::new(sink));
    vec![
        Flow::builder(processors::Error)
            .formatter(StringFormat::new("Processing of `{ctx.incoming.text}` failed: `{payload.error_message}`"))
            .shared_action(reply.clone())
            .build()
            .unwrap(),
        Flow::builder(UnknownCommand)
            .formatter(StringFormat::new("Command is invalid: `{payload.command}`. Try `help`."))
            .shared_action(reply.clone())
            .build()
            .unwrap(),
        Flow::builder(Version::default().with_version("1.2.3"))
            .formatter(StringFormat::new("Homebot version `{payload}` is up and running..."))
            .shared_action(reply.clone())
            .build()
            .unwrap(),
        Flow::builder(RegexProcessor::with_pattern("say", r"^\s*{command}(?P<words>.*)$", Say).unwrap())
            .shared_action(reply.clone())
            .build()
            .unwrap(),
        Flow::builder(Help::default())
            .formatter(HelpTable::new())
            .formatter(Codify::new())
            .shared_action(reply)
            .build()
            .unwrap(),
    ]
}

async fn run(inputs: Vec<Incoming>, sink: Arc<RecordingSink>, error_flow: ErrorFlow) {
    let (listener, tx) = ChannelListener::new(inputs.len().max(1));
    for incoming in inputs {
        tx.send(incoming).await.unwrap();
    }
    drop(tx);

    let orchestrator = Orchestrator::new(Box::new(listener), flows(sink)).with_error_flow(error_flow);
    timeout(TEST_TIMEOUT, orchestrator.run())
        .await
        .expect("orchestrator hung")
        .unwrap();
}

#[tokio::test]
async fn replies_to_every_message_in_order() {
    let sink = Arc::new(RecordingSink::default());
    run(
        vec![message("version"), message("say hello world"), message("dance")],
        sink.clone(),
        ErrorFlow::default(),
    )
    .await;

    assert_eq!(
        sink.texts().await,
        vec![
            "Homebot version `1.2.3` is up and running...".to_string(),
            "hello world".to_string(),
            "Command is invalid: `dance`. Try `help`.".to_string(),
        ]
    );
    let sent = sink.sent.lock().await;
    assert!(sent.iter().all(|(channel, _)| channel == "general"));
}

#[tokio::test]
async fn handler_fault_is_reported_to_the_user() {
    let sink = Arc::new(RecordingSink::default());
    run(vec![message("say")], sink.clone(), ErrorFlow::default()).await;

    assert_eq!(
        sink.texts().await,
        vec!["Processing of `say` failed: `nothing to say`".to_string()]
    );
}

#[tokio::test]
async fn help_lists_registered_commands() {
    let sink = Arc::new(RecordingSink::default());
    run(vec![message("HELP")], sink.clone(), ErrorFlow::default()).await;

    let texts = sink.texts().await;
    assert_eq!(texts.len(), 1);
    let table = &texts[0];
    assert!(table.starts_with("```+"));
    assert!(table.ends_with("+```"));
    assert!(table.contains("| version"));
    assert!(table.contains("say <words>"));
    assert!(table.contains("Repeats what you say."));
    assert!(table.contains("Shows this help page."));
}

#[tokio::test]
async fn sentinel_without_destination_reaches_error_flow() {
    // Empty payloads carry no channel, so the unknown-command reply faults,
    // and the error reply cannot render `ctx.incoming.text`.
    let sink = Arc::new(RecordingSink::default());
    let reports = Arc::new(RecordingSink::default());
    let error_flow = ErrorFlow::new(
        Vec::new(),
        vec![Arc::new(ReportAction(reports.clone()))],
    )
    .unwrap();

    run(vec![Incoming::Empty], sink.clone(), error_flow).await;

    assert!(sink.texts().await.is_empty());
    let reports = reports.texts().await;
    assert_eq!(reports.len(), 1);
    assert!(reports[0].starts_with("Template error"), "{}", reports[0]);
}

/// Error-flow action that records instead of replying.
struct ReportAction(Arc<RecordingSink>);

#[async_trait]
impl homebot::actions::Action for ReportAction {
    fn name(&self) -> &str {
        "report"
    }

    async fn execute(&self, _ctx: Context, payload: Payload) -> Result<(), FlowError> {
        self.0.send("reports", RichMessage::text(payload.to_string())).await
    }
}
