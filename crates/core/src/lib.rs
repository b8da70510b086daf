//! Domain logic for the service desk: ticket lifecycle, scheduling, and
//! calendar reconciliation rules. Nothing here touches the database or the
//! network.

pub mod appointment;
pub mod busy_block;
pub mod calendar_sync;
pub mod clock;
pub mod error;
pub mod roles;
pub mod sla;
pub mod sus;
pub mod sync_error;
pub mod ticket_lifecycle;
pub mod ticket_status;
pub mod types;
pub mod urgency;
