//! Zone and widget model: value types and pure geometry for zone macros.
//!
//! Everything here operates on snapshots of remote objects. Nothing in this
//! crate performs I/O; the engine fetches fresh snapshots, runs them through
//! these functions, and sends the resulting patches upstream.

pub mod layout;
pub mod transform;
pub mod widget;
pub mod zone;

pub use layout::{GridLayout, GridShape};
pub use transform::ZoneTransform;
pub use widget::{NewWidget, Point, Size, Widget, WidgetPatch, WidgetType, WidgetUpdatePlan};
pub use zone::{ZoneBoundingBox, widgets_in_zone};
