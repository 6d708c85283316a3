//! Macro behavior against an in-memory canvas.

use std::sync::Arc;

use tokio::sync::watch;

use canvas_pilot_client::testutil::MockCanvasApi;
use canvas_pilot_core::session::{CanvasEvent, CanvasSession};
use canvas_pilot_engine::{BatchReport, EngineError, MacroEngine, MacroKind, RetryPolicy};
use canvas_pilot_model::{Point, Size, Widget, WidgetType};

const CANVAS: &str = "cv";

fn widget(id: &str, kind: WidgetType, x: f64, y: f64) -> Widget {
    Widget::new(id, kind, Point::new(x, y))
}

fn anchor(id: &str, x: f64, y: f64, width: f64, height: f64) -> Widget {
    let mut w = widget(id, WidgetType::Anchor, x, y);
    w.size = Size { width, height };
    w
}

fn colored(id: &str, kind: WidgetType, x: f64, y: f64, color: &str) -> Widget {
    let mut w = widget(id, kind, x, y);
    w.background_color = Some(color.into());
    w
}

fn titled(id: &str, x: f64, y: f64, title: &str) -> Widget {
    let mut w = widget(id, WidgetType::Note, x, y);
    w.title = title.into();
    w
}

fn active_session() -> watch::Receiver<CanvasSession> {
    let mut session = CanvasSession::bound("client-1", "wall-1");
    session.apply(CanvasEvent {
        canvas_id: CANVAS.into(),
        canvas_name: "Ops".into(),
        timestamp: chrono::Utc::now(),
    });
    let (_tx, rx) = watch::channel(session);
    rx
}

fn engine(api: &Arc<MockCanvasApi>) -> MacroEngine {
    MacroEngine::new(api.clone(), active_session(), RetryPolicy::immediate(3))
}

/// Zone A (0,0,1000,1000) and zone B (2000,0,500,500).
fn two_zones() -> MockCanvasApi {
    MockCanvasApi::new()
        .with_widget(CANVAS, anchor("A", 0.0, 0.0, 1000.0, 1000.0))
        .with_widget(CANVAS, anchor("B", 2000.0, 0.0, 500.0, 500.0))
}

#[tokio::test]
async fn test_move_maps_geometry_onto_target() {
    let mut scaled = widget("img", WidgetType::Image, 500.0, 200.0);
    scaled.scale = Some(2.0);
    let api = Arc::new(
        two_zones()
            .with_widget(CANVAS, widget("n1", WidgetType::Note, 100.0, 100.0))
            .with_widget(CANVAS, scaled)
            .with_widget(CANVAS, widget("conn", WidgetType::Connector, 300.0, 300.0))
            .with_widget(CANVAS, widget("edge", WidgetType::Note, 1.0, 500.0))
            .with_widget(CANVAS, widget("far", WidgetType::Note, 5000.0, 5000.0)),
    );

    let outcome = engine(&api).move_zone("A", "B").await.unwrap();
    assert_eq!(outcome.kind, MacroKind::Move);
    assert_eq!(outcome.report, BatchReport { succeeded: 2, failed: 0 });

    let n1 = api.widget(CANVAS, "n1").unwrap();
    assert_eq!(n1.location, Point::new(2050.0, 50.0));
    assert_eq!(n1.scale, Some(0.5));

    let img = api.widget(CANVAS, "img").unwrap();
    assert_eq!(img.location, Point::new(2250.0, 100.0));
    assert_eq!(img.scale, Some(1.0));

    for untouched in ["conn", "edge", "far", "A", "B"] {
        assert_eq!(api.patch_attempts(untouched), 0, "{untouched}");
    }
}

#[tokio::test]
async fn test_move_between_identical_zones_is_identity() {
    let mut w = widget("n1", WidgetType::Note, 123.0, 456.0);
    w.scale = Some(0.8);
    let api = Arc::new(
        MockCanvasApi::new()
            .with_widget(CANVAS, anchor("A", 0.0, 0.0, 1000.0, 1000.0))
            .with_widget(CANVAS, anchor("A2", 0.0, 0.0, 1000.0, 1000.0))
            .with_widget(CANVAS, w),
    );

    engine(&api).move_zone("A", "A2").await.unwrap();
    let after = api.widget(CANVAS, "n1").unwrap();
    assert_eq!(after.location, Point::new(123.0, 456.0));
    assert_eq!(after.scale, Some(0.8));
}

#[tokio::test]
async fn test_copy_creates_and_reuploads() {
    let mut pdf = widget("doc", WidgetType::Pdf, 200.0, 400.0);
    pdf.original_filename = Some("plan.pdf".into());
    pdf.title = "Plan".into();
    let mut note = widget("n1", WidgetType::Note, 100.0, 100.0);
    note.text = Some("hello".into());

    let api = Arc::new(
        two_zones()
            .with_widget(CANVAS, note)
            .with_widget(CANVAS, pdf)
            .with_widget(CANVAS, widget("conn", WidgetType::Connector, 50.0, 50.0))
            .with_binary("doc", b"%PDF-1.7"),
    );

    let outcome = engine(&api).copy_zone("A", "B").await.unwrap();
    assert_eq!(outcome.report, BatchReport { succeeded: 2, failed: 0 });

    let created = api.created();
    assert_eq!(created.len(), 2);

    let note = &created[0];
    assert_eq!(note.widget_type, WidgetType::Note);
    assert_eq!(note.body.location, Point::new(2050.0, 50.0));
    assert_eq!(note.body.scale, Some(0.5));
    assert_eq!(note.body.text.as_deref(), Some("hello"));
    assert!(note.upload.is_none());

    let pdf = &created[1];
    assert_eq!(pdf.widget_type, WidgetType::Pdf);
    assert_eq!(pdf.body.location, Point::new(2100.0, 200.0));
    assert_eq!(pdf.body.title.as_deref(), Some("Plan"));
    let (name, data) = pdf.upload.clone().unwrap();
    assert_eq!(name, "plan.pdf");
    assert_eq!(&data[..], b"%PDF-1.7");

    // Sources stay where they were.
    assert_eq!(api.widget(CANVAS, "n1").unwrap().location, Point::new(100.0, 100.0));
    assert!(api.patches().is_empty());
}

#[tokio::test]
async fn test_copy_counts_missing_binary_as_failure() {
    let api = Arc::new(two_zones().with_widget(CANVAS, widget("v", WidgetType::Video, 10.0, 10.0)));
    let outcome = engine(&api).copy_zone("A", "B").await.unwrap();
    assert_eq!(outcome.report, BatchReport { succeeded: 0, failed: 1 });
    assert!(api.created().is_empty());
}

#[tokio::test]
async fn test_copy_keeps_note_color() {
    let api = Arc::new(
        two_zones().with_widget(CANVAS, colored("n1", WidgetType::Note, 100.0, 100.0, "#ff0000ff")),
    );

    let outcome = engine(&api).copy_zone("A", "B").await.unwrap();
    assert_eq!(outcome.report, BatchReport { succeeded: 1, failed: 0 });

    let created = api.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].body.background_color.as_deref(), Some("#ff0000ff"));
    assert_eq!(created[0].body.location, Point::new(2050.0, 50.0));
}

#[tokio::test]
async fn test_pin_and_unpin() {
    let api = Arc::new(
        two_zones()
            .with_widget(CANVAS, widget("n1", WidgetType::Note, 100.0, 100.0))
            .with_widget(CANVAS, widget("b1", WidgetType::Browser, 900.0, 900.0))
            .with_widget(CANVAS, widget("out", WidgetType::Note, 2100.0, 100.0)),
    );
    let engine = engine(&api);

    let outcome = engine.run_in_zone(MacroKind::Pin, "A").await.unwrap();
    assert_eq!(outcome.message(), "Pinned 2 widget(s)");
    assert!(api.widget(CANVAS, "n1").unwrap().pinned);
    assert!(api.widget(CANVAS, "b1").unwrap().pinned);
    assert!(!api.widget(CANVAS, "out").unwrap().pinned);

    engine.run_in_zone(MacroKind::Unpin, "A").await.unwrap();
    assert!(!api.widget(CANVAS, "n1").unwrap().pinned);
}

#[tokio::test]
async fn test_auto_grid_seven_widgets() {
    let mut api = MockCanvasApi::new().with_widget(CANVAS, anchor("Z", 1000.0, 500.0, 2000.0, 1000.0));
    for i in 0..7 {
        api = api.with_widget(
            CANVAS,
            widget(&format!("w{i}"), WidgetType::Note, 1010.0 + i as f64 * 10.0, 700.0),
        );
    }
    let api = Arc::new(api);

    let outcome = engine(&api).auto_grid("Z").await.unwrap();
    assert_eq!(outcome.report.succeeded, 7);

    // 2 rows x 4 cols, cells 375 x 350.
    assert_eq!(api.widget(CANVAS, "w0").unwrap().location, Point::new(1100.0, 600.0));
    assert_eq!(api.widget(CANVAS, "w3").unwrap().location, Point::new(2525.0, 600.0));
    assert_eq!(api.widget(CANVAS, "w4").unwrap().location, Point::new(1100.0, 1050.0));
    assert_eq!(api.widget(CANVAS, "w6").unwrap().location, Point::new(2050.0, 1050.0));
}

#[tokio::test]
async fn test_auto_grid_empty_zone() {
    let api = Arc::new(two_zones());
    let outcome = engine(&api).auto_grid("A").await.unwrap();
    assert_eq!(outcome.report.total(), 0);
}

#[tokio::test]
async fn test_auto_grid_rejects_flat_zone() {
    let api = Arc::new(MockCanvasApi::new().with_widget(CANVAS, anchor("F", 0.0, 0.0, 1000.0, 0.0)));
    let err = engine(&api).auto_grid("F").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_group_by_color_uses_full_records() {
    let api = Arc::new(
        MockCanvasApi::new()
            .with_widget(CANVAS, anchor("G", 10.0, 20.0, 5000.0, 5000.0))
            .with_widget(CANVAS, colored("a", WidgetType::Note, 900.0, 900.0, "#ff0000ff"))
            .with_widget(CANVAS, colored("b", WidgetType::Note, 800.0, 800.0, "#0000ffff"))
            .with_widget(CANVAS, colored("c", WidgetType::Note, 700.0, 700.0, "#ff0000ff"))
            .with_widget(CANVAS, widget("plain", WidgetType::Note, 600.0, 600.0))
            .with_widget(CANVAS, colored("img", WidgetType::Image, 500.0, 500.0, "#ff0000ff")),
    );

    let outcome = engine(&api).group_by_color("G").await.unwrap();
    assert_eq!(outcome.groups, Some(2));
    assert_eq!(outcome.report.succeeded, 3);
    assert_eq!(outcome.message(), "Grouped 3 widget(s) into 2 group(s)");

    assert_eq!(api.widget(CANVAS, "b").unwrap().location, Point::new(110.0, 120.0));
    assert_eq!(api.widget(CANVAS, "a").unwrap().location, Point::new(410.0, 120.0));
    assert_eq!(api.widget(CANVAS, "c").unwrap().location, Point::new(410.0, 320.0));
    assert_eq!(api.patch_attempts("plain"), 0);
    assert_eq!(api.patch_attempts("img"), 0);
}

#[tokio::test]
async fn test_group_by_title() {
    let api = Arc::new(
        MockCanvasApi::new()
            .with_widget(CANVAS, anchor("G", 0.0, 0.0, 5000.0, 5000.0))
            .with_widget(CANVAS, titled("t1", 50.0, 50.0, "Risks"))
            .with_widget(CANVAS, titled("t2", 60.0, 60.0, ""))
            .with_widget(CANVAS, titled("t3", 70.0, 70.0, "risks"))
            .with_widget(CANVAS, widget("conn", WidgetType::Connector, 80.0, 80.0)),
    );

    let outcome = engine(&api).group_by_title("G").await.unwrap();
    assert_eq!(outcome.groups, Some(2));
    // "risks" sorts before "untitled".
    assert_eq!(api.widget(CANVAS, "t1").unwrap().location, Point::new(100.0, 100.0));
    assert_eq!(api.widget(CANVAS, "t3").unwrap().location, Point::new(100.0, 300.0));
    assert_eq!(api.widget(CANVAS, "t2").unwrap().location, Point::new(400.0, 100.0));
    assert_eq!(api.patch_attempts("conn"), 0);
}

#[tokio::test]
async fn test_failing_widget_is_counted_not_fatal() {
    let api = Arc::new(
        two_zones()
            .with_widget(CANVAS, widget("x", WidgetType::Note, 100.0, 100.0))
            .with_widget(CANVAS, widget("y", WidgetType::Note, 200.0, 200.0))
            .with_failing("x"),
    );
    let outcome = engine(&api).set_pinned("A", true).await.unwrap();
    assert_eq!(outcome.report, BatchReport { succeeded: 1, failed: 1 });
    assert_eq!(outcome.message(), "Pinned 1 widget(s), 1 failed");
    assert_eq!(api.patch_attempts("x"), 3);
    assert!(api.widget(CANVAS, "y").unwrap().pinned);
}

#[tokio::test]
async fn test_missing_anchor_is_upstream_error() {
    let api = Arc::new(two_zones());
    let err = engine(&api).move_zone("A", "nope").await.unwrap_err();
    assert!(matches!(err, EngineError::Upstream(_)));
}

#[tokio::test]
async fn test_requires_bound_client_and_canvas() {
    let api = Arc::new(two_zones());

    let (_tx, unbound) = watch::channel(CanvasSession::default());
    let engine = MacroEngine::new(api.clone(), unbound, RetryPolicy::immediate(3));
    assert!(matches!(
        engine.auto_grid("A").await,
        Err(EngineError::Unavailable(_))
    ));

    let (_tx, no_canvas) = watch::channel(CanvasSession::bound("client-1", "wall-1"));
    let engine = MacroEngine::new(api, no_canvas, RetryPolicy::immediate(3));
    assert!(matches!(
        engine.move_zone("A", "B").await,
        Err(EngineError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_relocation_kinds_need_two_zones() {
    let api = Arc::new(two_zones());
    let err = engine(&api).run_in_zone(MacroKind::Copy, "A").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));
    assert_eq!(MacroKind::from_name("group-by-color"), Some(MacroKind::GroupByColor));
    assert_eq!(MacroKind::from_name("explode"), None);
}
