//! Axum route handlers.

pub mod probes;
pub mod relay;
