//! HTTP handlers. Each one extracts the principal and input, delegates to
//! [`crate::engine`] or a repository, and wraps the result in
//! [`crate::response::DataResponse`].

pub mod appointments;
pub mod busy_blocks;
pub mod calendar;
pub mod notifications;
pub mod technicians;
pub mod tickets;
