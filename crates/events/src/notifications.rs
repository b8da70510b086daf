//! Fire-and-forget user notifications.
//!
//! Engines publish a [`Notice`] as a `"notification"` [`DeskEvent`];
//! [`NotificationDispatcher`] persists it in the background. A failure to
//! store a notification is logged and never reaches the publisher.

use serde::{Deserialize, Serialize};
use servicedesk_core::types::DbId;
use servicedesk_db::models::notification::CreateNotification;
use servicedesk_db::repositories::NotificationRepo;
use servicedesk_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::{DeskEvent, EventBus};

/// Event type carrying a [`Notice`] payload.
pub const NOTIFICATION_EVENT: &str = "notification";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TicketAccepted,
    TicketRejected,
    TicketClosed,
    TicketUpdated,
    AppointmentScheduled,
    RescheduleRequested,
    RescheduleAccepted,
    RescheduleDeclined,
    AppointmentCancelled,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::TicketAccepted => "ticket_accepted",
            NotificationKind::TicketRejected => "ticket_rejected",
            NotificationKind::TicketClosed => "ticket_closed",
            NotificationKind::TicketUpdated => "ticket_updated",
            NotificationKind::AppointmentScheduled => "appointment_scheduled",
            NotificationKind::RescheduleRequested => "reschedule_requested",
            NotificationKind::RescheduleAccepted => "reschedule_accepted",
            NotificationKind::RescheduleDeclined => "reschedule_declined",
            NotificationKind::AppointmentCancelled => "appointment_cancelled",
        }
    }
}

/// A message for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub user_id: DbId,
    pub ticket_id: Option<DbId>,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

impl Notice {
    pub fn new(
        user_id: DbId,
        ticket_id: Option<DbId>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            ticket_id,
            title: title.into(),
            message: message.into(),
            kind,
        }
    }

    /// Wrap as a bus event.
    pub fn into_event(self) -> DeskEvent {
        // Plain strings and integers; serialization is infallible.
        let payload = serde_json::to_value(&self).unwrap_or_default();
        let event = DeskEvent::new(NOTIFICATION_EVENT, payload);
        match self.ticket_id {
            Some(ticket_id) => event.about("ticket", ticket_id),
            None => event,
        }
    }

    /// Extract a notice from a bus event, if it carries one.
    pub fn from_event(event: &DeskEvent) -> Option<Self> {
        if event.name != NOTIFICATION_EVENT {
            return None;
        }
        serde_json::from_value(event.payload.clone()).ok()
    }
}

impl From<&Notice> for CreateNotification {
    fn from(notice: &Notice) -> Self {
        CreateNotification {
            user_id: notice.user_id,
            ticket_id: notice.ticket_id,
            title: notice.title.clone(),
            message: notice.message.clone(),
            notification_type: notice.kind.as_str().to_string(),
        }
    }
}

/// Publish a notice without waiting for it to be stored.
pub fn notify(bus: &EventBus, notice: Notice) {
    tracing::debug!(
        user_id = notice.user_id,
        kind = notice.kind.as_str(),
        "Queueing notification"
    );
    bus.publish(notice.into_event());
}

/// Background service that persists notification events.
pub struct NotificationDispatcher;

impl NotificationDispatcher {
    /// Run until the bus is dropped.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<DeskEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let Some(notice) = Notice::from_event(&event) else {
                        continue;
                    };
                    if let Err(e) = NotificationRepo::create(&pool, &(&notice).into()).await {
                        tracing::warn!(
                            error = %e,
                            user_id = notice.user_id,
                            kind = notice.kind.as_str(),
                            "Failed to store notification"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification dispatcher lagged, notifications lost");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification dispatcher shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice() -> Notice {
        Notice::new(
            5,
            Some(9),
            NotificationKind::TicketAccepted,
            "Ticket accepted",
            "A technician is working on your ticket",
        )
    }

    #[test]
    fn notice_survives_the_bus_envelope() {
        let event = notice().into_event();
        assert_eq!(event.name, NOTIFICATION_EVENT);
        assert_eq!(event.subject.map(|s| s.id), Some(9));
        assert_eq!(Notice::from_event(&event), Some(notice()));
    }

    #[test]
    fn other_events_are_not_notices() {
        let event = DeskEvent::new("ticket.accepted", serde_json::json!({}));
        assert_eq!(Notice::from_event(&event), None);
    }

    #[test]
    fn converts_to_insert_dto() {
        let dto = CreateNotification::from(&notice());
        assert_eq!(dto.notification_type, "ticket_accepted");
        assert_eq!(dto.ticket_id, Some(9));
    }

    #[tokio::test]
    async fn notify_publishes_on_the_bus() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        notify(&bus, notice());
        let event = rx.recv().await.unwrap();
        assert_eq!(Notice::from_event(&event).unwrap().user_id, 5);
    }
}
