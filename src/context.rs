//! Dispatch context: the original payload of one dispatch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::pipeline::types::Incoming;

/// Per-dispatch context.
///
/// Wraps the payload the listener originally delivered. Fallback cycles reuse
/// the context of the dispatch that spawned them, so `incoming` always refers
/// to what the user actually sent. Every stage receives its own clone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Context {
    /// The original incoming payload.
    pub incoming: Incoming,
    /// Correlates log lines across a dispatch and its fallback cycles.
    pub dispatch_id: Uuid,
    /// When the dispatch started.
    pub received_at: DateTime<Utc>,
}

impl Context {
    /// Create a context for a fresh dispatch.
    pub fn new(incoming: Incoming) -> Self {
        Self {
            incoming,
            dispatch_id: Uuid::new_v4(),
            received_at: Utc::now(),
        }
    }

    /// Serialize into a JSON value for template lookups.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
