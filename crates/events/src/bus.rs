//! Fan-out of desk events over a `tokio::sync::broadcast` channel.
//!
//! One [`EventBus`] lives in `AppState` behind an `Arc`. Publishing is
//! synchronous and infallible for the caller: with no subscriber the event
//! is simply dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use servicedesk_core::types::DbId;
use tokio::sync::broadcast;

/// Buffered events per subscriber before the slowest starts lagging.
const CHANNEL_CAPACITY: usize = 1024;

/// The record an event is about, e.g. `ticket` 42.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub kind: &'static str,
    pub id: DbId,
}

/// Something that happened on the desk, named like `"notification"`.
#[derive(Debug, Clone, Serialize)]
pub struct DeskEvent {
    pub name: &'static str,
    pub subject: Option<Subject>,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl DeskEvent {
    pub fn new(name: &'static str, payload: serde_json::Value) -> Self {
        Self {
            name,
            subject: None,
            payload,
            occurred_at: Utc::now(),
        }
    }

    pub fn about(mut self, kind: &'static str, id: DbId) -> Self {
        self.subject = Some(Subject { kind, id });
        self
    }
}

pub struct EventBus {
    sender: broadcast::Sender<DeskEvent>,
}

impl EventBus {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
        }
    }

    pub fn publish(&self, event: DeskEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("Event dropped, no subscribers");
        }
    }

    /// A new receiver sees only events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<DeskEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }
}
