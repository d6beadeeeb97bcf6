//! Homebot: a message-driven bot orchestrator.

pub mod actions;
pub mod assets;
pub mod config;
pub mod context;
pub mod error;
pub mod formatters;
pub mod listeners;
pub mod pipeline;
pub mod processors;

pub use assets::AssetManager;
pub use config::BotConfig;
pub use context::Context;
pub use error::{Error, Result};
pub use pipeline::flow::{ErrorFlow, Flow, FlowTable};
pub use pipeline::orchestrator::{DispatchOutcome, Dispatcher, Orchestrator};
pub use pipeline::types::{HelpEntry, Incoming, Payload, RichMessage};
