//! Service desk event bus and notification sink.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`DeskEvent`]: the event envelope.
//! - [`NotificationDispatcher`]: background service that stores
//!   notification events in the `notifications` table.

pub mod bus;
pub mod notifications;

pub use bus::{DeskEvent, EventBus, Subject};
pub use notifications::{notify, Notice, NotificationDispatcher, NotificationKind};
