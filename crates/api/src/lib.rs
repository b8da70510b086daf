//! Service desk API server library.
//!
//! Exposes the building blocks (config, state, engines, error handling,
//! routes) so integration tests and the binary entrypoint can both use them.

pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;
