//! Gateway integration tests: start a real gateway over an in-memory canvas
//! server and drive it over HTTP.
//!
//! Run with: `cargo test -p canvas-pilot-gateway --test integration`

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use canvas_pilot_client::ClientError;
use canvas_pilot_client::testutil::MockCanvasApi;
use canvas_pilot_core::config::Config;
use canvas_pilot_gateway::{GatewayState, start_gateway};
use canvas_pilot_model::{Point, Size, Widget, WidgetType};

/// Find an available port.
fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn test_config() -> Config {
    Config::parse(
        r#"{
            client: { installation_name: "wall-1" },
            tracker: { reconnect_delay_secs: 1 },
            fanout: { poll_interval_ms: 50 },
            macros: { max_attempts: 3, retry_base_delay_ms: 0 },
        }"#,
    )
    .unwrap()
}

fn canvas_with_zone() -> MockCanvasApi {
    let mut zone = Widget::new("Z", WidgetType::Anchor, Point::new(0.0, 0.0));
    zone.size = Size {
        width: 1000.0,
        height: 1000.0,
    };
    MockCanvasApi::new()
        .with_client("client-1", "wall-1")
        .with_widget("cv-1", zone)
        .with_widget("cv-1", Widget::new("n1", WidgetType::Note, Point::new(100.0, 100.0)))
        .with_widget("cv-1", Widget::new("n2", WidgetType::Note, Point::new(200.0, 200.0)))
}

struct TestGateway {
    port: u16,
    api: Arc<MockCanvasApi>,
    shutdown: CancellationToken,
    server: JoinHandle<anyhow::Result<()>>,
}

impl TestGateway {
    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }
}

/// Start a gateway; `live` receives the workspace subscription feed.
async fn start_test_gateway(
    api: MockCanvasApi,
) -> (TestGateway, mpsc::UnboundedSender<Result<Bytes, ClientError>>) {
    let port = find_free_port();
    let api = Arc::new(api);
    let live = api.push_live();
    let shutdown = CancellationToken::new();

    let state = Arc::new(GatewayState::build(
        Arc::new(test_config()),
        api.clone(),
        shutdown.clone(),
    ));
    let server = tokio::spawn(start_gateway(state, port));

    // Wait for gateway to be ready
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .is_ok()
        {
            break;
        }
    }

    (
        TestGateway {
            port,
            api,
            shutdown,
            server,
        },
        live,
    )
}

fn frame(canvas_id: &str, canvas_name: &str) -> Result<Bytes, ClientError> {
    Ok(Bytes::from(format!(
        "data: {}\n",
        json!({"canvas_id": canvas_id, "canvas_name": canvas_name})
    )))
}

async fn get_json(url: &str) -> Value {
    reqwest::get(url).await.unwrap().json().await.unwrap()
}

/// Poll `/api/status` until the tracker reports `canvas_id`.
async fn wait_for_canvas(gw: &TestGateway, canvas_id: &str) {
    for _ in 0..100 {
        let status = get_json(&gw.url("/api/status")).await;
        if status["canvas_id"] == canvas_id {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("tracker never reported canvas {canvas_id}");
}

/// Read an SSE response until `buffer` contains `needle`.
async fn read_until(resp: &mut reqwest::Response, buffer: &mut String, needle: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !buffer.contains(needle) {
        let chunk = tokio::time::timeout_at(deadline, resp.chunk())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}; got {buffer:?}"))
            .unwrap()
            .unwrap_or_else(|| panic!("stream ended waiting for {needle:?}; got {buffer:?}"));
        buffer.push_str(&String::from_utf8_lossy(&chunk));
    }
}

async fn post_macro(gw: &TestGateway, name: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(gw.url(&format!("/api/macros/{name}")))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_health_and_identity() {
    let (gw, _live) = start_test_gateway(canvas_with_zone()).await;

    let health = get_json(&gw.url("/health")).await;
    assert_eq!(health["status"], "ok");
    assert!(health["version"].is_string());

    let client = get_json(&gw.url("/api/client")).await;
    assert_eq!(client["client_id"], "client-1");
    assert_eq!(client["installation_name"], "wall-1");
    assert_eq!(client["connected"], false);

    let canvas = get_json(&gw.url("/api/canvas")).await;
    assert_eq!(canvas["canvas_id"], "");
}

#[tokio::test]
async fn test_status_follows_subscription() {
    let (gw, live) = start_test_gateway(canvas_with_zone()).await;

    live.send(frame("cv-1", "Ops")).unwrap();
    wait_for_canvas(&gw, "cv-1").await;

    let status = get_json(&gw.url("/api/status")).await;
    assert_eq!(status["canvas_name"], "Ops");
    assert_eq!(status["client_id"], "client-1");
    assert_eq!(status["connected"], true);
}

#[tokio::test]
async fn test_events_initial_keepalive_and_update() {
    let (gw, live) = start_test_gateway(canvas_with_zone()).await;

    let mut resp = reqwest::get(gw.url("/events")).await.unwrap();
    assert!(resp.status().is_success());
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let mut buffer = String::new();
    read_until(&mut resp, &mut buffer, "event: canvas_update").await;
    read_until(&mut resp, &mut buffer, "\n\n").await;
    assert!(buffer.contains(r#""canvas_id":"""#));

    buffer.clear();
    read_until(&mut resp, &mut buffer, ": keepalive").await;

    live.send(frame("cv-1", "Ops")).unwrap();
    buffer.clear();
    read_until(&mut resp, &mut buffer, r#""canvas_id":"cv-1""#).await;
    assert!(buffer.contains(r#""canvas_name":"Ops""#));
    assert!(buffer.contains(r#""client_name":"wall-1""#));

    let health = get_json(&gw.url("/health")).await;
    assert_eq!(health["fanout_connections"], 1);
}

#[tokio::test]
async fn test_macros_over_http() {
    let (gw, live) = start_test_gateway(canvas_with_zone()).await;

    // No active canvas yet.
    let (status, body) = post_macro(&gw, "pin", json!({"zoneId": "Z"})).await;
    assert_eq!(status, 503);
    assert_eq!(body["success"], false);

    live.send(frame("cv-1", "Ops")).unwrap();
    wait_for_canvas(&gw, "cv-1").await;

    let (status, body) = post_macro(&gw, "pin", json!({"zoneId": "Z"})).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Pinned 2 widget(s)");
    assert!(gw.api.widget("cv-1", "n1").unwrap().pinned);

    let (status, body) = post_macro(&gw, "auto-grid", json!({})).await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("zoneId"));

    let (status, _) = post_macro(&gw, "move", json!({"sourceZoneId": "Z"})).await;
    assert_eq!(status, 400);

    let (status, _) = post_macro(&gw, "move", json!({"sourceZoneId": "Z", "targetZoneId": "gone"})).await;
    assert_eq!(status, 502);

    let (status, _) = post_macro(&gw, "explode", json!({"zoneId": "Z"})).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_macro_finishes_after_client_disconnects() {
    let mut api = canvas_with_zone().with_patch_delay(Duration::from_millis(100));
    for i in 0..8 {
        let x = 300.0 + 50.0 * i as f64;
        api = api.with_widget("cv-1", Widget::new(format!("m{i}"), WidgetType::Note, Point::new(x, x)));
    }
    let (gw, live) = start_test_gateway(api).await;
    live.send(frame("cv-1", "Ops")).unwrap();
    wait_for_canvas(&gw, "cv-1").await;

    let impatient = reqwest::Client::builder()
        .timeout(Duration::from_millis(250))
        .build()
        .unwrap();
    let sent = impatient
        .post(gw.url("/api/macros/pin"))
        .json(&json!({"zoneId": "Z"}))
        .send()
        .await;
    assert!(sent.is_err(), "request should time out mid-batch");

    // 10 widgets at 100ms each; all of them land after the client is gone.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while gw.api.patches().len() < 10 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(gw.api.patches().len(), 10);
    assert!(gw.api.widget("cv-1", "m7").unwrap().pinned);
}

#[tokio::test]
async fn test_shutdown_ends_streams_and_server() {
    let (gw, _live) = start_test_gateway(canvas_with_zone()).await;

    let mut resp = reqwest::get(gw.url("/events")).await.unwrap();
    let mut buffer = String::new();
    read_until(&mut resp, &mut buffer, "event: canvas_update").await;

    gw.shutdown.cancel();

    let ended = tokio::time::timeout(Duration::from_secs(3), async {
        while let Ok(Some(_)) = resp.chunk().await {}
    })
    .await;
    assert!(ended.is_ok(), "event stream outlived shutdown");

    let result = tokio::time::timeout(Duration::from_secs(3), gw.server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
