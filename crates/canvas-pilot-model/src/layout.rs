//! Grid and group layouts inside a zone.

use std::collections::BTreeMap;

use crate::widget::{Point, Widget, WidgetType};
use crate::zone::ZoneBoundingBox;

/// Gap between grid cells and around the grid edge.
pub const GRID_MARGIN: f64 = 100.0;

/// Horizontal distance between consecutive groups.
pub const GROUP_COLUMN_PITCH: f64 = 300.0;

/// Vertical distance between members of one group.
pub const GROUP_ROW_PITCH: f64 = 200.0;

/// Offset of the first group from the zone origin.
pub const GROUP_MARGIN: f64 = 100.0;

/// Bucket for widgets with an empty title.
pub const UNTITLED_GROUP: &str = "untitled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub rows: usize,
    pub cols: usize,
}

/// Choose the row/column split whose column-to-row ratio is closest to `aspect`.
///
/// Rows are tried from 1 upward with `cols = ceil(count / rows)`; the first
/// candidate reaching a strictly lower score wins, so ties favor fewer rows.
pub fn solve_grid(count: usize, aspect: f64) -> GridShape {
    let mut best = GridShape { rows: 1, cols: count.max(1) };
    let mut best_score = f64::INFINITY;

    for rows in 1..=count {
        let cols = count.div_ceil(rows);
        let score = (aspect - cols as f64 / rows as f64).abs();
        if score < best_score {
            best_score = score;
            best = GridShape { rows, cols };
        }
    }

    best
}

/// Cell geometry for reflowing `count` widgets into a zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub shape: GridShape,
    pub cell_width: f64,
    pub cell_height: f64,
    origin: Point,
}

impl GridLayout {
    pub fn new(zone: &ZoneBoundingBox, count: usize) -> Self {
        let shape = solve_grid(count, zone.aspect_ratio());
        let cols = shape.cols as f64;
        let rows = shape.rows as f64;
        Self {
            shape,
            cell_width: (zone.width - GRID_MARGIN * (cols + 1.0)) / cols,
            cell_height: (zone.height - GRID_MARGIN * (rows + 1.0)) / rows,
            origin: zone.origin(),
        }
    }

    /// Top-left of the cell for the `index`-th widget, filling rows left to right.
    pub fn position(&self, index: usize) -> Point {
        let row = (index / self.shape.cols) as f64;
        let col = (index % self.shape.cols) as f64;
        Point::new(
            self.origin.x + GRID_MARGIN + col * (self.cell_width + GRID_MARGIN),
            self.origin.y + GRID_MARGIN + row * (self.cell_height + GRID_MARGIN),
        )
    }
}

/// Case-insensitive title key; empty titles share [`UNTITLED_GROUP`].
///
/// Whitespace is significant: `" Risks"` and `"risks"` are different groups.
pub fn title_key(widget: &Widget) -> String {
    if widget.title.is_empty() {
        UNTITLED_GROUP.to_string()
    } else {
        widget.title.to_lowercase()
    }
}

/// Exact background color of a note; `None` excludes the widget from color grouping.
pub fn color_key(widget: &Widget) -> Option<String> {
    if widget.widget_type != WidgetType::Note {
        return None;
    }
    widget
        .background_color
        .as_ref()
        .filter(|c| !c.is_empty())
        .cloned()
}

/// Partition widgets by key. Widgets for which `key` returns `None` are dropped.
///
/// Groups iterate in lexicographic key order; members keep input order.
pub fn group_by<'a, I, F>(widgets: I, key: F) -> BTreeMap<String, Vec<&'a Widget>>
where
    I: IntoIterator<Item = &'a Widget>,
    F: Fn(&Widget) -> Option<String>,
{
    let mut groups: BTreeMap<String, Vec<&'a Widget>> = BTreeMap::new();
    for widget in widgets {
        if let Some(k) = key(widget) {
            groups.entry(k).or_default().push(widget);
        }
    }
    groups
}

/// Target location for every grouped widget: one column per group.
pub fn group_positions<'a>(
    zone: &ZoneBoundingBox,
    groups: &BTreeMap<String, Vec<&'a Widget>>,
) -> Vec<(&'a Widget, Point)> {
    let mut placed = Vec::new();
    for (col, members) in groups.values().enumerate() {
        for (row, widget) in members.iter().enumerate() {
            placed.push((
                *widget,
                Point::new(
                    zone.x + GROUP_MARGIN + col as f64 * GROUP_COLUMN_PITCH,
                    zone.y + GROUP_MARGIN + row as f64 * GROUP_ROW_PITCH,
                ),
            ));
        }
    }
    placed
}
