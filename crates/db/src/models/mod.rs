//! Row types and DTOs, one module per table.

pub mod appointment;
pub mod audit;
pub mod busy_block;
pub mod notification;
pub mod technician_stats;
pub mod ticket;
