//! Help entry table renderer.

use async_trait::async_trait;

use crate::context::Context;
use crate::error::FlowError;
use crate::formatters::Formatter;
use crate::pipeline::types::{HelpEntry, Payload};

/// Default wrap width of the usage column.
pub const DEFAULT_USAGE_WIDTH: usize = 40;

/// Default wrap width of the description column.
pub const DEFAULT_DESCRIPTION_WIDTH: usize = 80;

/// Renders a list of help entries as a fixed-width ASCII table.
///
/// ```text
/// +---------+--------------+--------------+
/// | Command | Usage        | Description  |
/// +---------+--------------+--------------+
/// | custom  | custom usage | custom descr |
/// +---------+--------------+--------------+
/// ```
pub struct HelpTable {
    usage_width: usize,
    description_width: usize,
}

impl HelpTable {
    pub fn new() -> Self {
        Self {
            usage_width: DEFAULT_USAGE_WIDTH,
            description_width: DEFAULT_DESCRIPTION_WIDTH,
        }
    }

    pub fn with_widths(usage_width: usize, description_width: usize) -> Self {
        Self {
            usage_width: usage_width.max(1),
            description_width: description_width.max(1),
        }
    }

    /// Render entries into the table text.
    pub fn render(&self, entries: &[HelpEntry]) -> String {
        let header = vec![
            vec!["Command".to_string()],
            vec!["Usage".to_string()],
            vec!["Description".to_string()],
        ];
        let mut rows = vec![header];
        for entry in entries {
            rows.push(vec![
                vec![entry.command.clone()],
                wrap(&entry.usage, self.usage_width),
                wrap(&entry.description, self.description_width),
            ]);
        }

        let mut widths = [0usize; 3];
        for row in &rows {
            for (col, cell) in row.iter().enumerate() {
                for line in cell {
                    widths[col] = widths[col].max(line.chars().count());
                }
            }
        }

        let border = {
            let parts: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
            format!("+{}+", parts.join("+"))
        };

        let mut lines = vec![border.clone()];
        for row in &rows {
            let height = row.iter().map(Vec::len).max().unwrap_or(1);
            for i in 0..height {
                let cells: Vec<String> = row
                    .iter()
                    .enumerate()
                    .map(|(col, cell)| {
                        let text = cell.get(i).map(String::as_str).unwrap_or("");
                        let pad = widths[col] - text.chars().count();
                        format!(" {text}{} ", " ".repeat(pad))
                    })
                    .collect();
                lines.push(format!("|{}|", cells.join("|")));
            }
            lines.push(border.clone());
        }

        lines.join("\n")
    }
}

impl Default for HelpTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Formatter for HelpTable {
    fn name(&self) -> &str {
        "help_table"
    }

    async fn format(&self, _ctx: Context, payload: Payload) -> Result<Payload, FlowError> {
        match payload {
            Payload::Help(entries) => Ok(Payload::Text(self.render(&entries))),
            other => Err(FlowError::UnsupportedPayload {
                stage: "Formatter",
                name: self.name().to_string(),
                expected: "help",
                found: other.kind(),
            }),
        }
    }
}

/// Greedy word wrap. Words longer than `width` are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }
        let needed = if current.is_empty() {
            word.len()
        } else {
            current.chars().count() + 1 + word.len()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
