//! Restricted template evaluator.
//!
//! Templates are literal text with `{...}` placeholders that look up values on
//! the dispatch context or the stage payload:
//!
//! ```text
//! Processing of `{ctx.incoming.text}` failed: {payload.error_message}
//! {payload[0].command:<12} {payload['key']} {payload.price:>8.2}
//! ```
//!
//! A placeholder is a root (`ctx` or `payload`), followed by any number of
//! `.field`, `[index]` or `['key']` accessors, and an optional format spec
//! `[[fill]align][width][.precision]`. `{{` and `}}` produce literal braces.
//! Nothing is ever executed: roots are serialized to JSON and walked.

use serde_json::Value;

use crate::context::Context;
use crate::error::TemplateError;
use crate::pipeline::types::Payload;

/// Render `template` against a context and payload.
pub fn interpolate(
    template: &str,
    ctx: &Context,
    payload: &Payload,
) -> Result<String, TemplateError> {
    let roots = Roots::new(ctx, payload);
    render(template, &roots)
}

/// Lazily serialized template roots.
pub(crate) struct Roots<'a> {
    ctx: &'a Context,
    payload: &'a Payload,
    ctx_value: std::cell::OnceCell<Value>,
    payload_value: std::cell::OnceCell<Value>,
}

impl<'a> Roots<'a> {
    pub(crate) fn new(ctx: &'a Context, payload: &'a Payload) -> Self {
        Self {
            ctx,
            payload,
            ctx_value: std::cell::OnceCell::new(),
            payload_value: std::cell::OnceCell::new(),
        }
    }

    fn get(&self, root: &str) -> Result<&Value, TemplateError> {
        match root {
            "ctx" => Ok(self.ctx_value.get_or_init(|| self.ctx.to_value())),
            "payload" => Ok(self.payload_value.get_or_init(|| self.payload.to_value())),
            other => Err(TemplateError::UnknownRoot {
                root: other.to_string(),
            }),
        }
    }
}

/// Render a template string against already-built roots.
pub(crate) fn render(template: &str, roots: &Roots<'_>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            '{' => {
                if let Some((_, '{')) = chars.peek() {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut body = String::new();
                let mut quote: Option<char> = None;
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    match quote {
                        Some(q) if c == q => quote = None,
                        Some(_) => {}
                        None if c == '\'' || c == '"' => quote = Some(c),
                        None if c == '}' => {
                            closed = true;
                            break;
                        }
                        None if c == '{' => {
                            return Err(TemplateError::Malformed {
                                placeholder: body,
                                reason: "nested '{'".into(),
                            });
                        }
                        None => {}
                    }
                    body.push(c);
                }
                if !closed {
                    return Err(TemplateError::Unbalanced { brace: '{', offset });
                }
                out.push_str(&render_placeholder(&body, roots)?);
            }
            '}' => {
                if let Some((_, '}')) = chars.peek() {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(TemplateError::Unbalanced { brace: '}', offset });
                }
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

// ── Placeholder parsing ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn render_placeholder(body: &str, roots: &Roots<'_>) -> Result<String, TemplateError> {
    let (expr, spec) = split_spec(body);
    let (root, segments) = parse_path(expr.trim())?;
    let spec = spec.map(|s| FormatSpec::parse(s, body)).transpose()?;

    let mut value = roots.get(&root)?;
    let mut path = root.clone();
    for segment in &segments {
        value = step(value, segment).ok_or_else(|| TemplateError::Unresolved {
            path: format!("{path}{}", describe(segment)),
            reason: format!("no such field on {}", type_name(value)),
        })?;
        path.push_str(&describe(segment));
    }

    Ok(match spec {
        Some(spec) => spec.apply(value),
        None => render_value(value),
    })
}

/// Split `expr:spec` at the first colon outside brackets and quotes.
fn split_spec(body: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in body.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                ':' if depth == 0 => return (&body[..i], Some(&body[i + 1..])),
                _ => {}
            },
        }
    }
    (body, None)
}

fn parse_path(expr: &str) -> Result<(String, Vec<Segment>), TemplateError> {
    let malformed = |reason: &str| TemplateError::Malformed {
        placeholder: expr.to_string(),
        reason: reason.to_string(),
    };

    let root_end = expr
        .find(|c: char| c == '.' || c == '[')
        .unwrap_or(expr.len());
    let root = &expr[..root_end];
    if !is_identifier(root) {
        return Err(malformed("expected 'ctx' or 'payload' as root"));
    }

    let mut segments = Vec::new();
    let mut rest = &expr[root_end..];
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after
                .find(|c: char| c == '.' || c == '[')
                .unwrap_or(after.len());
            let name = &after[..end];
            if name.is_empty() {
                return Err(malformed("empty field name"));
            }
            segments.push(match name.parse::<usize>() {
                Ok(i) => Segment::Index(i),
                Err(_) if is_identifier(name) => Segment::Key(name.to_string()),
                Err(_) => return Err(malformed("invalid field name")),
            });
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let (segment, consumed) =
                parse_bracket(after).ok_or_else(|| malformed("unterminated '['"))?;
            segments.push(segment);
            rest = &after[consumed..];
        } else {
            return Err(malformed("unexpected characters after accessor"));
        }
    }

    Ok((root.to_string(), segments))
}

/// Parse the inside of `[...]`; returns the segment and bytes consumed
/// including the closing bracket.
fn parse_bracket(s: &str) -> Option<(Segment, usize)> {
    let first = s.chars().next()?;
    if first == '\'' || first == '"' {
        let inner = &s[1..];
        let close = inner.find(first)?;
        let key = &inner[..close];
        let after = &inner[close + 1..];
        if !after.starts_with(']') {
            return None;
        }
        return Some((Segment::Key(key.to_string()), 1 + close + 1 + 1));
    }
    let close = s.find(']')?;
    let raw = s[..close].trim();
    if raw.is_empty() {
        return None;
    }
    let segment = match raw.parse::<usize>() {
        Ok(i) => Segment::Index(i),
        Err(_) => Segment::Key(raw.to_string()),
    };
    Some((segment, close + 1))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn step<'v>(value: &'v Value, segment: &Segment) -> Option<&'v Value> {
    match (value, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get(key),
        (Value::Object(map), Segment::Index(i)) => map.get(&i.to_string()),
        (Value::Array(items), Segment::Index(i)) => items.get(*i),
        _ => None,
    }
}

fn describe(segment: &Segment) -> String {
    match segment {
        Segment::Key(key) => format!(".{key}"),
        Segment::Index(i) => format!("[{i}]"),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Render a resolved value as text.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// ── Format spec ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Align {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, PartialEq)]
struct FormatSpec {
    fill: char,
    align: Option<Align>,
    width: usize,
    precision: Option<usize>,
}

impl FormatSpec {
    fn parse(spec: &str, placeholder: &str) -> Result<Self, TemplateError> {
        let malformed = |reason: &str| TemplateError::Malformed {
            placeholder: placeholder.to_string(),
            reason: reason.to_string(),
        };
        let align_of = |c: char| match c {
            '<' => Some(Align::Left),
            '>' => Some(Align::Right),
            '^' => Some(Align::Center),
            _ => None,
        };

        let chars: Vec<char> = spec.chars().collect();
        let mut pos = 0;
        let mut fill = ' ';
        let mut align = None;
        if chars.len() >= 2 && align_of(chars[1]).is_some() {
            fill = chars[0];
            align = align_of(chars[1]);
            pos = 2;
        } else if let Some(a) = chars.first().and_then(|c| align_of(*c)) {
            align = Some(a);
            pos = 1;
        }

        let width_start = pos;
        while pos < chars.len() && chars[pos].is_ascii_digit() {
            pos += 1;
        }
        let width = if pos > width_start {
            chars[width_start..pos]
                .iter()
                .collect::<String>()
                .parse()
                .map_err(|_| malformed("width out of range"))?
        } else {
            0
        };

        let mut precision = None;
        if pos < chars.len() && chars[pos] == '.' {
            pos += 1;
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos == start {
                return Err(malformed("missing precision after '.'"));
            }
            precision = Some(
                chars[start..pos]
                    .iter()
                    .collect::<String>()
                    .parse()
                    .map_err(|_| malformed("precision out of range"))?,
            );
        }

        if pos != chars.len() {
            return Err(malformed("unsupported format spec"));
        }

        Ok(Self {
            fill,
            align,
            width,
            precision,
        })
    }

    fn apply(&self, value: &Value) -> String {
        let text = match (value, self.precision) {
            (Value::Number(n), Some(p)) => match n.as_f64() {
                Some(f) => format!("{f:.p$}"),
                None => n.to_string(),
            },
            (_, Some(p)) => render_value(value).chars().take(p).collect(),
            (_, None) => render_value(value),
        };

        let len = text.chars().count();
        if len >= self.width {
            return text;
        }
        let pad = self.width - len;
        let default_align = if value.is_number() {
            Align::Right
        } else {
            Align::Left
        };
        let fill = |n: usize| std::iter::repeat_n(self.fill, n).collect::<String>();
        match self.align.unwrap_or(default_align) {
            Align::Left => format!("{text}{}", fill(pad)),
            Align::Right => format!("{}{text}", fill(pad)),
            Align::Center => format!("{}{text}{}", fill(pad / 2), fill(pad - pad / 2)),
        }
    }
}
