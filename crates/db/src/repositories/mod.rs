//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that take
//! `&PgPool`, or a `&mut Transaction` when the caller must group several
//! writes atomically.

pub mod appointment_repo;
pub mod busy_block_repo;
pub mod notification_repo;
pub mod technician_stats_repo;
pub mod ticket_audit_repo;
pub mod ticket_repo;

pub use appointment_repo::AppointmentRepo;
pub use busy_block_repo::BusyBlockRepo;
pub use notification_repo::NotificationRepo;
pub use technician_stats_repo::TechnicianStatsRepo;
pub use ticket_audit_repo::TicketAuditRepo;
pub use ticket_repo::TicketRepo;
