use std::sync::Arc;

use homebot::actions::{Action, MessageSink, SendMessage, StdoutSink, WebhookSink};
use homebot::formatters::{Codify, StringFormat};
use homebot::listeners::StdinListener;
use homebot::processors::{self, Help, UnknownCommand, Version};
use homebot::{BotConfig, Flow, Orchestrator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    // RUST_LOG wins over HOMEBOT_LOG
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_target(false)
        .init();

    let sink: Arc<dyn MessageSink> = match &config.webhook {
        Some(webhook) => Arc::new(WebhookSink::new(
            webhook.url.clone(),
            webhook.token.clone(),
            webhook.timeout,
        )?),
        None => Arc::new(StdoutSink),
    };
    let reply: Arc<dyn Action> = Arc::new(SendMessage::new(sink.clone()));

    eprintln!("🤖 {} v{}", config.name, env!("CARGO_PKG_VERSION"));
    eprintln!("   Replies: {}", sink.name());
    eprintln!("   Type a command and press Enter. Ctrl+D to exit.\n");

    let help = Help::default();
    let unknown_reply = format!(
        "Command is invalid: `{{payload.command}}`. Try `{}`.",
        help.command()
    );

    let flows = vec![
        Flow::builder(processors::Error)
            .formatter(StringFormat::new(
                "Processing of `{ctx.incoming.text}` failed: `{payload.error_message}`\n```{payload.trace}```",
            ))
            .shared_action(reply.clone())
            .build()?,
        Flow::builder(UnknownCommand)
            .formatter(StringFormat::new(unknown_reply))
            .shared_action(reply.clone())
            .build()?,
        Flow::builder(Version::default())
            .formatter(StringFormat::new("Homebot version `{payload}` is up and running..."))
            .shared_action(reply.clone())
            .build()?,
        Flow::builder(help)
            .formatter(config.help_table())
            .formatter(Codify::new())
            .shared_action(reply)
            .build()?,
    ];

    tracing::info!(name = %config.name, flows = flows.len(), "Starting homebot");
    let orchestrator = Orchestrator::new(Box::new(StdinListener::new()), flows);
    orchestrator.run().await?;

    tracing::info!("Homebot shutting down");
    Ok(())
}
