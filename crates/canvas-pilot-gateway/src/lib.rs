//! Local HTTP gateway.
//!
//! Serves three things to processes on this machine: a server-sent event
//! stream of active-canvas changes (`/events`), zone macro endpoints
//! (`/api/macros/*`) and read-only status (`/api/status`, `/health`).

pub mod fanout;
pub mod macros;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod server;
pub mod state;
pub mod status;

pub use server::{router, start_gateway};
pub use state::GatewayState;
