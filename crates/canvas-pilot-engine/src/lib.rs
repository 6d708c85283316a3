//! Zone macro engine.
//!
//! Macros operate on zones, rectangular canvas regions marked by anchor
//! widgets. Each request fetches fresh snapshots, computes the target
//! geometry with `canvas_pilot_model`, and sends one mutation per widget
//! through a retrying [`BatchExecutor`]. Individual widget failures are
//! counted, never fatal.

pub mod batch;
pub mod engine;
pub mod error;
pub mod locks;
pub mod retry;

pub use batch::{BatchExecutor, BatchReport};
pub use engine::{MacroEngine, MacroKind, MacroOutcome};
pub use error::{EngineError, Result};
pub use retry::RetryPolicy;
