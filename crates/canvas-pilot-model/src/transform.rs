//! Affine mapping of widgets from one zone onto another.

use crate::widget::{Point, Widget};
use crate::zone::ZoneBoundingBox;

/// Maps positions in a source zone onto a target zone.
///
/// The scale is uniform and derived from widths only; a target with a
/// different aspect ratio is not stretched to fit vertically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneTransform {
    source: ZoneBoundingBox,
    target: ZoneBoundingBox,
    scale_factor: f64,
}

impl ZoneTransform {
    /// Returns `None` when the source has no width to scale from.
    pub fn new(source: ZoneBoundingBox, target: ZoneBoundingBox) -> Option<Self> {
        if !(source.width > 0.0) {
            return None;
        }
        Some(Self {
            source,
            target,
            scale_factor: target.width / source.width,
        })
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn map_point(&self, p: Point) -> Point {
        Point::new(
            self.target.x + (p.x - self.source.x) * self.scale_factor,
            self.target.y + (p.y - self.source.y) * self.scale_factor,
        )
    }

    /// New scale for a widget, treating an unset scale as 1.
    pub fn map_scale(&self, scale: Option<f64>) -> f64 {
        scale.unwrap_or(1.0) * self.scale_factor
    }

    /// A transformed copy of `widget`; the input is left as it was.
    pub fn apply(&self, widget: &Widget) -> Widget {
        widget.placed(self.map_point(widget.location), self.map_scale(widget.scale))
    }
}
