//! Zones: rectangular canvas regions defined by anchor widgets.

use serde::{Deserialize, Serialize};

use crate::widget::{Point, Widget};

/// Inward margin applied on every side of a zone when testing membership,
/// so widgets resting exactly on a shared border belong to neither zone.
pub const ZONE_MARGIN: f64 = 2.0;

/// Bounding box of a zone, snapshotted from its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneBoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

impl ZoneBoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            scale: 1.0,
        }
    }

    pub fn from_anchor(anchor: &Widget) -> Self {
        Self {
            x: anchor.location.x,
            y: anchor.location.y,
            width: anchor.size.width,
            height: anchor.size.height,
            scale: anchor.effective_scale(),
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Width over height; infinite for a zero-height zone.
    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Membership test with the [`ZONE_MARGIN`] inset, inclusive on both ends.
    pub fn contains(&self, p: Point) -> bool {
        self.x + ZONE_MARGIN <= p.x
            && p.x <= self.x + self.width - ZONE_MARGIN
            && self.y + ZONE_MARGIN <= p.y
            && p.y <= self.y + self.height - ZONE_MARGIN
    }
}

/// Content widgets whose reference point lies inside `zone`, in input order.
///
/// Anchors and connectors are never members.
pub fn widgets_in_zone<'a>(zone: &ZoneBoundingBox, widgets: &'a [Widget]) -> Vec<&'a Widget> {
    widgets
        .iter()
        .filter(|w| !w.widget_type.is_structural())
        .filter(|w| zone.contains(w.location))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::WidgetType;

    fn reference_in_zone(p: Point, b: &ZoneBoundingBox) -> bool {
        (b.x + 2.0 <= p.x && p.x <= b.x + b.width - 2.0)
            && (b.y + 2.0 <= p.y && p.y <= b.y + b.height - 2.0)
    }

    #[test]
    fn test_margin_boundaries() {
        let zone = ZoneBoundingBox::new(100.0, 100.0, 200.0, 100.0);
        assert!(zone.contains(Point::new(102.0, 102.0)));
        assert!(zone.contains(Point::new(298.0, 198.0)));
        assert!(!zone.contains(Point::new(101.9, 150.0)));
        assert!(!zone.contains(Point::new(298.1, 150.0)));
        assert!(!zone.contains(Point::new(150.0, 100.0)));
        assert!(!zone.contains(Point::new(150.0, 199.0)));
    }

    #[test]
    fn test_membership_matches_formula_over_grid() {
        let boxes = [
            ZoneBoundingBox::new(0.0, 0.0, 10.0, 10.0),
            ZoneBoundingBox::new(-50.0, 20.0, 4.0, 100.0),
            ZoneBoundingBox::new(7.5, -3.0, 3.0, 3.0),
        ];
        for b in &boxes {
            for xi in -60..=60 {
                for yi in -10..=130 {
                    let p = Point::new(xi as f64 * 0.5, yi as f64);
                    assert_eq!(b.contains(p), reference_in_zone(p, b), "{p:?} in {b:?}");
                }
            }
        }
    }

    #[test]
    fn test_structural_widgets_excluded() {
        let zone = ZoneBoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let widgets = vec![
            Widget::new("n", WidgetType::Note, Point::new(50.0, 50.0)),
            Widget::new("a", WidgetType::Anchor, Point::new(50.0, 50.0)),
            Widget::new("c", WidgetType::Connector, Point::new(50.0, 50.0)),
            Widget::new("out", WidgetType::Image, Point::new(500.0, 50.0)),
            Widget::new("i", WidgetType::Image, Point::new(10.0, 90.0)),
        ];
        let ids: Vec<&str> = widgets_in_zone(&zone, &widgets)
            .iter()
            .map(|w| w.id.as_str())
            .collect();
        assert_eq!(ids, vec!["n", "i"]);
    }

    #[test]
    fn test_from_anchor() {
        let mut anchor = Widget::new("z", WidgetType::Anchor, Point::new(10.0, 20.0));
        anchor.size.width = 400.0;
        anchor.size.height = 300.0;
        let zone = ZoneBoundingBox::from_anchor(&anchor);
        assert_eq!(zone, ZoneBoundingBox::new(10.0, 20.0, 400.0, 300.0));
        assert!(zone.has_area());
        assert!((zone.aspect_ratio() - 4.0 / 3.0).abs() < 1e-9);
    }
}
