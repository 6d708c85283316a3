use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, info};

use canvas_pilot_client::{CanvasApi, ClientError};
use canvas_pilot_core::session::CanvasSession;
use canvas_pilot_model::layout::{self, GridLayout};
use canvas_pilot_model::{
    Widget, WidgetPatch, WidgetType, WidgetUpdatePlan, ZoneBoundingBox, ZoneTransform,
    widgets_in_zone,
};

use crate::batch::{BatchExecutor, BatchReport};
use crate::error::{EngineError, Result};
use crate::locks::ZoneLocks;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroKind {
    Move,
    Copy,
    Pin,
    Unpin,
    AutoGrid,
    GroupByColor,
    GroupByTitle,
}

impl MacroKind {
    pub const ALL: [MacroKind; 7] = [
        Self::Move,
        Self::Copy,
        Self::Pin,
        Self::Unpin,
        Self::AutoGrid,
        Self::GroupByColor,
        Self::GroupByTitle,
    ];

    /// Route segment and log name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Copy => "copy",
            Self::Pin => "pin",
            Self::Unpin => "unpin",
            Self::AutoGrid => "auto-grid",
            Self::GroupByColor => "group-by-color",
            Self::GroupByTitle => "group-by-title",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Whether the macro reads a source and a target zone.
    pub fn is_relocation(&self) -> bool {
        matches!(self, Self::Move | Self::Copy)
    }

    fn verb(&self) -> &'static str {
        match self {
            Self::Move => "Moved",
            Self::Copy => "Copied",
            Self::Pin => "Pinned",
            Self::Unpin => "Unpinned",
            Self::AutoGrid => "Arranged",
            Self::GroupByColor | Self::GroupByTitle => "Grouped",
        }
    }
}

impl fmt::Display for MacroKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one macro run.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroOutcome {
    pub kind: MacroKind,
    pub report: BatchReport,
    /// Number of groups for the grouping macros.
    pub groups: Option<usize>,
}

impl MacroOutcome {
    fn new(kind: MacroKind, report: BatchReport) -> Self {
        Self {
            kind,
            report,
            groups: None,
        }
    }

    pub fn message(&self) -> String {
        let BatchReport { succeeded, failed } = self.report;
        let mut msg = format!("{} {succeeded} widget(s)", self.kind.verb());
        if let Some(groups) = self.groups {
            msg.push_str(&format!(" into {groups} group(s)"));
        }
        if failed > 0 {
            msg.push_str(&format!(", {failed} failed"));
        }
        msg
    }
}

/// Runs zone macros against the active canvas.
///
/// Every macro re-reads its anchors and the canvas widget list, so results
/// always reflect the server state at the time of the request.
pub struct MacroEngine {
    api: Arc<dyn CanvasApi>,
    session: watch::Receiver<CanvasSession>,
    batch: BatchExecutor,
    locks: ZoneLocks,
}

impl MacroEngine {
    pub fn new(
        api: Arc<dyn CanvasApi>,
        session: watch::Receiver<CanvasSession>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            batch: BatchExecutor::new(api.clone(), policy),
            api,
            session,
            locks: ZoneLocks::new(),
        }
    }

    /// Canvas the bound client is showing right now.
    pub fn active_canvas(&self) -> Result<String> {
        let session = self.session.borrow();
        if session.client_id.is_empty() {
            return Err(EngineError::Unavailable(
                "no canvas client is bound to this installation".into(),
            ));
        }
        if !session.has_canvas() {
            return Err(EngineError::Unavailable("no active canvas yet".into()));
        }
        Ok(session.canvas_id.clone())
    }

    /// Dispatch a single-zone macro by kind.
    pub async fn run_in_zone(&self, kind: MacroKind, zone_id: &str) -> Result<MacroOutcome> {
        match kind {
            MacroKind::Pin => self.set_pinned(zone_id, true).await,
            MacroKind::Unpin => self.set_pinned(zone_id, false).await,
            MacroKind::AutoGrid => self.auto_grid(zone_id).await,
            MacroKind::GroupByColor => self.group_by_color(zone_id).await,
            MacroKind::GroupByTitle => self.group_by_title(zone_id).await,
            MacroKind::Move | MacroKind::Copy => Err(EngineError::InvalidRequest(format!(
                "{kind} needs a source and a target zone"
            ))),
        }
    }

    /// Map every widget in the source zone onto the target zone, in place.
    pub async fn move_zone(&self, source_id: &str, target_id: &str) -> Result<MacroOutcome> {
        let canvas_id = self.active_canvas()?;
        let _guard = self.locks.acquire(&canvas_id, &[source_id, target_id]).await;

        let (source, transform) = self.transform(&canvas_id, source_id, target_id).await?;
        let widgets = self.api.list_widgets(&canvas_id).await?;
        let plans: Vec<WidgetUpdatePlan> = widgets_in_zone(&source, &widgets)
            .into_iter()
            .map(|w| {
                let patch =
                    WidgetPatch::place(transform.map_point(w.location), transform.map_scale(w.scale));
                WidgetUpdatePlan::new(w, patch)
            })
            .collect();

        let report = self.batch.apply(&canvas_id, &plans).await;
        Ok(self.finish(MacroKind::Move, &canvas_id, source_id, report))
    }

    /// Recreate every widget of the source zone inside the target zone.
    pub async fn copy_zone(&self, source_id: &str, target_id: &str) -> Result<MacroOutcome> {
        let canvas_id = self.active_canvas()?;
        let _guard = self.locks.acquire(&canvas_id, &[source_id, target_id]).await;

        let (source, transform) = self.transform(&canvas_id, source_id, target_id).await?;
        let widgets = self.api.list_widgets(&canvas_id).await?;

        let mut report = BatchReport::default();
        for widget in widgets_in_zone(&source, &widgets) {
            let ok = self
                .batch
                .retrying(&widget.id, || self.copy_widget(&canvas_id, widget, &transform))
                .await;
            report.record(ok);
        }
        Ok(self.finish(MacroKind::Copy, &canvas_id, source_id, report))
    }

    pub async fn set_pinned(&self, zone_id: &str, pinned: bool) -> Result<MacroOutcome> {
        let canvas_id = self.active_canvas()?;
        let _guard = self.locks.acquire(&canvas_id, &[zone_id]).await;

        let zone = self.zone(&canvas_id, zone_id).await?;
        let widgets = self.api.list_widgets(&canvas_id).await?;
        let plans: Vec<WidgetUpdatePlan> = widgets_in_zone(&zone, &widgets)
            .into_iter()
            .map(|w| WidgetUpdatePlan::new(w, WidgetPatch::pin(pinned)))
            .collect();

        let report = self.batch.apply(&canvas_id, &plans).await;
        let kind = if pinned { MacroKind::Pin } else { MacroKind::Unpin };
        Ok(self.finish(kind, &canvas_id, zone_id, report))
    }

    /// Reflow the zone's widgets into the grid closest to its aspect ratio.
    pub async fn auto_grid(&self, zone_id: &str) -> Result<MacroOutcome> {
        let canvas_id = self.active_canvas()?;
        let _guard = self.locks.acquire(&canvas_id, &[zone_id]).await;

        let zone = self.zone(&canvas_id, zone_id).await?;
        if !zone.has_area() {
            return Err(EngineError::InvalidRequest(format!(
                "zone '{zone_id}' has no area"
            )));
        }
        let widgets = self.api.list_widgets(&canvas_id).await?;
        let members = widgets_in_zone(&zone, &widgets);

        let layout = GridLayout::new(&zone, members.len());
        debug!(
            zone_id,
            rows = layout.shape.rows,
            cols = layout.shape.cols,
            "Grid layout"
        );
        let plans: Vec<WidgetUpdatePlan> = members
            .iter()
            .enumerate()
            .map(|(i, w)| WidgetUpdatePlan::new(w, WidgetPatch::relocate(layout.position(i))))
            .collect();

        let report = self.batch.apply(&canvas_id, &plans).await;
        Ok(self.finish(MacroKind::AutoGrid, &canvas_id, zone_id, report))
    }

    /// Column per note color. Notes without a color stay where they are.
    pub async fn group_by_color(&self, zone_id: &str) -> Result<MacroOutcome> {
        let canvas_id = self.active_canvas()?;
        let _guard = self.locks.acquire(&canvas_id, &[zone_id]).await;

        let zone = self.zone(&canvas_id, zone_id).await?;
        let widgets = self.api.list_widgets(&canvas_id).await?;

        // The listing omits colors; read each note's full record.
        let mut notes = Vec::new();
        for w in widgets_in_zone(&zone, &widgets) {
            if w.widget_type == WidgetType::Note {
                notes.push(self.api.get_widget(&canvas_id, &w.widget_type, &w.id).await?);
            }
        }

        let groups = layout::group_by(&notes, layout::color_key);
        self.apply_groups(MacroKind::GroupByColor, &canvas_id, zone_id, &zone, &groups)
            .await
    }

    /// Column per case-insensitive title.
    pub async fn group_by_title(&self, zone_id: &str) -> Result<MacroOutcome> {
        let canvas_id = self.active_canvas()?;
        let _guard = self.locks.acquire(&canvas_id, &[zone_id]).await;

        let zone = self.zone(&canvas_id, zone_id).await?;
        let widgets = self.api.list_widgets(&canvas_id).await?;
        let groups = layout::group_by(widgets_in_zone(&zone, &widgets), |w| {
            Some(layout::title_key(w))
        });
        self.apply_groups(MacroKind::GroupByTitle, &canvas_id, zone_id, &zone, &groups)
            .await
    }

    async fn apply_groups(
        &self,
        kind: MacroKind,
        canvas_id: &str,
        zone_id: &str,
        zone: &ZoneBoundingBox,
        groups: &std::collections::BTreeMap<String, Vec<&Widget>>,
    ) -> Result<MacroOutcome> {
        let plans: Vec<WidgetUpdatePlan> = layout::group_positions(zone, groups)
            .into_iter()
            .map(|(w, p)| WidgetUpdatePlan::new(w, WidgetPatch::relocate(p)))
            .collect();
        let report = self.batch.apply(canvas_id, &plans).await;
        let mut outcome = self.finish(kind, canvas_id, zone_id, report);
        outcome.groups = Some(groups.len());
        Ok(outcome)
    }

    async fn zone(&self, canvas_id: &str, zone_id: &str) -> Result<ZoneBoundingBox> {
        let anchor = self.api.get_anchor(canvas_id, zone_id).await?;
        Ok(ZoneBoundingBox::from_anchor(&anchor))
    }

    async fn transform(
        &self,
        canvas_id: &str,
        source_id: &str,
        target_id: &str,
    ) -> Result<(ZoneBoundingBox, ZoneTransform)> {
        let source = self.zone(canvas_id, source_id).await?;
        let target = self.zone(canvas_id, target_id).await?;
        let transform = ZoneTransform::new(source, target).ok_or_else(|| {
            EngineError::InvalidRequest(format!("source zone '{source_id}' has no width"))
        })?;
        Ok((source, transform))
    }

    /// One copy attempt for a single widget.
    async fn copy_widget(
        &self,
        canvas_id: &str,
        widget: &Widget,
        transform: &ZoneTransform,
    ) -> std::result::Result<(), ClientError> {
        // The listing omits fields such as background_color; copy the full record.
        let full = self
            .api
            .get_widget(canvas_id, &widget.widget_type, &widget.id)
            .await?;
        let body = transform.apply(&full).to_new_widget();
        if !widget.widget_type.carries_binary() {
            return self
                .api
                .create_widget(canvas_id, &widget.widget_type, &body)
                .await;
        }

        let data: Bytes = self
            .api
            .download_binary(canvas_id, &widget.widget_type, &widget.id)
            .await?;
        self.api
            .upload_widget(
                canvas_id,
                &widget.widget_type,
                &body,
                &upload_file_name(&full),
                data,
            )
            .await
    }

    fn finish(
        &self,
        kind: MacroKind,
        canvas_id: &str,
        zone_id: &str,
        report: BatchReport,
    ) -> MacroOutcome {
        info!(
            macro_kind = %kind,
            canvas_id,
            zone_id,
            succeeded = report.succeeded,
            failed = report.failed,
            "Macro finished"
        );
        MacroOutcome::new(kind, report)
    }
}

/// Original file name, else the title, else the widget id.
fn upload_file_name(widget: &Widget) -> String {
    widget
        .original_filename
        .clone()
        .filter(|n| !n.is_empty())
        .or_else(|| Some(widget.title.clone()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| widget.id.clone())
}
