//! API layer for HTTP request handling.
//!
//! - `POST /webhook` - relay one monitoring alert to the ticketing backend
//! - `GET /health/live` - process liveness
//! - `GET /health/ready` - readiness (secret store reachability)
//!
//! Authentication of inbound callers is handled by an external gateway; this
//! layer only validates request shape.

pub mod handlers;
