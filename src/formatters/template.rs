//! Rich message templates.
//!
//! Two engines render a [`RichMessage`] from a template:
//! - `Json`: the template is a JSON document; every string leaf is run through
//!   the restricted interpolator, recursing into nested maps and lists.
//!   Non-string leaves are copied untouched.
//! - `Handlebars`: the template file is rendered with `{ctx, payload}` as data
//!   and the output parsed as JSON. Values are JSON-string escaped.

use std::path::Path;

use async_trait::async_trait;
use handlebars::Handlebars;
use serde_json::Value;
use tracing::debug;

use crate::assets::AssetManager;
use crate::context::Context;
use crate::error::{ConfigError, FlowError, TemplateError};
use crate::formatters::Formatter;
use crate::formatters::interpolate::{Roots, render};
use crate::pipeline::types::{Payload, RichMessage};

/// Name the handlebars source is registered under.
const HANDLEBARS_TEMPLATE_NAME: &str = "message";

/// Template engine used by a [`RichMessageTemplate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateEngine {
    Json,
    Handlebars,
}

impl TemplateEngine {
    /// Pick an engine from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(Self::Json),
            Some("hbs") | Some("handlebars") => Some(Self::Handlebars),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum Source {
    Json(Value),
    Handlebars(Box<Handlebars<'static>>),
}

/// A compiled rich message template.
#[derive(Debug)]
pub struct RichMessageTemplate {
    source: Source,
}

impl RichMessageTemplate {
    /// Template from an in-memory JSON document.
    pub fn json(template: Value) -> Self {
        Self {
            source: Source::Json(template),
        }
    }

    /// Template from handlebars source text.
    pub fn handlebars(template: &str) -> Result<Self, ConfigError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(json_escape);
        registry
            .register_template_string(HANDLEBARS_TEMPLATE_NAME, template)
            .map_err(|e| ConfigError::TemplateLoad {
                path: "<inline>".into(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            source: Source::Handlebars(Box::new(registry)),
        })
    }

    /// Load a JSON template file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = read(path)?;
        let value = serde_json::from_str(&text).map_err(|e| ConfigError::TemplateLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::json(value))
    }

    /// Load a handlebars template file.
    pub fn from_handlebars_file(path: &Path) -> Result<Self, ConfigError> {
        let text = read(path)?;
        Self::handlebars(&text).map_err(|e| match e {
            ConfigError::TemplateLoad { reason, .. } => ConfigError::TemplateLoad {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Load a template file, choosing the engine from its extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match TemplateEngine::from_path(path) {
            Some(TemplateEngine::Json) => Self::from_json_file(path),
            Some(TemplateEngine::Handlebars) => Self::from_handlebars_file(path),
            None => Err(ConfigError::TemplateLoad {
                path: path.display().to_string(),
                reason: "unknown template extension (expected .json, .hbs or .handlebars)".into(),
            }),
        }
    }

    /// Load a template by name from the asset manager's template directory.
    pub fn from_assets(assets: &AssetManager, name: &str) -> Result<Self, ConfigError> {
        let path = assets
            .template_path(name)
            .map_err(|e| ConfigError::TemplateLoad {
                path: name.to_string(),
                reason: e.to_string(),
            })?;
        Self::from_file(&path)
    }

    pub fn engine(&self) -> TemplateEngine {
        match self.source {
            Source::Json(_) => TemplateEngine::Json,
            Source::Handlebars(_) => TemplateEngine::Handlebars,
        }
    }

    /// Render the template into a rich message.
    pub fn render(&self, ctx: &Context, payload: &Payload) -> Result<RichMessage, TemplateError> {
        let rendered = match &self.source {
            Source::Json(template) => {
                let roots = Roots::new(ctx, payload);
                render_leaves(template, &roots)?
            }
            Source::Handlebars(registry) => {
                let data = serde_json::json!({
                    "ctx": ctx.to_value(),
                    "payload": payload.to_value(),
                });
                let text = registry
                    .render(HANDLEBARS_TEMPLATE_NAME, &data)
                    .map_err(|e| TemplateError::Engine(e.to_string()))?;
                serde_json::from_str(&text).map_err(|e| TemplateError::InvalidJson(e.to_string()))?
            }
        };
        serde_json::from_value(rendered).map_err(|e| TemplateError::NotRichMessage(e.to_string()))
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::TemplateLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Interpolate every string leaf of a JSON document.
fn render_leaves(value: &Value, roots: &Roots<'_>) -> Result<Value, TemplateError> {
    Ok(match value {
        Value::String(s) => Value::String(render(s, roots)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| render_leaves(item, roots))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), render_leaves(item, roots)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}

/// Escape a value so it can sit inside a JSON string literal.
fn json_escape(raw: &str) -> String {
    let quoted = Value::String(raw.to_string()).to_string();
    quoted
        .strip_prefix('"')
        .and_then(|q| q.strip_suffix('"'))
        .map(str::to_string)
        .unwrap_or(quoted)
}

/// Formatter that renders a [`RichMessageTemplate`].
pub struct Template {
    template: RichMessageTemplate,
}

impl Template {
    pub fn new(template: RichMessageTemplate) -> Self {
        Self { template }
    }
}

#[async_trait]
impl Formatter for Template {
    fn name(&self) -> &str {
        "template"
    }

    async fn format(&self, ctx: Context, payload: Payload) -> Result<Payload, FlowError> {
        let message = self.template.render(&ctx, &payload)?;
        debug!(
            dispatch_id = %ctx.dispatch_id,
            blocks = message.blocks.as_ref().map_or(0, Vec::len),
            "Rendered rich message"
        );
        Ok(Payload::Rich(message))
    }
}
