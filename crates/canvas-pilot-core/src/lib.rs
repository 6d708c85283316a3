//! Shared config, errors, session values and local wire protocol for canvas-pilot.

pub mod config;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod session;
