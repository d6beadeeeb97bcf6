//! Formatters: turn a result payload into something presentable.
//!
//! A flow pipes the processor result through its formatters in order; the
//! output of one formatter is the input of the next.

pub mod codify;
pub mod help_table;
pub mod interpolate;
pub mod string_format;
pub mod template;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::FlowError;
use crate::pipeline::types::Payload;

pub use codify::Codify;
pub use help_table::HelpTable;
pub use interpolate::interpolate;
pub use string_format::StringFormat;
pub use template::{RichMessageTemplate, Template, TemplateEngine};

/// A pure payload transformation.
#[async_trait]
pub trait Formatter: Send + Sync {
    /// Formatter name for logging.
    fn name(&self) -> &str;

    /// Transform the payload.
    async fn format(&self, ctx: Context, payload: Payload) -> Result<Payload, FlowError>;
}
