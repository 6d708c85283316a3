//! `GET /events`: canvas updates pushed to local consumers over SSE.
//!
//! Every connection polls the tracker on its own and emits a
//! `canvas_update` whenever the active canvas id or name differs from what
//! that connection last sent. Quiet polls emit a keepalive comment.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::Stream;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

use canvas_pilot_core::protocol::{CANVAS_UPDATE_EVENT, CanvasUpdate};
use canvas_pilot_core::session::CanvasSession;

use crate::state::GatewayState;

const KEEPALIVE_COMMENT: &str = "keepalive";

/// What one poll produces for a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum FanoutItem {
    Update(CanvasUpdate),
    KeepAlive,
}

/// Per-connection memory of the last emitted canvas.
#[derive(Debug, Default)]
pub struct LastEmitted {
    canvas_id: String,
    canvas_name: String,
}

impl LastEmitted {
    /// Always an update; used for the event sent on connect.
    pub fn initial(&mut self, session: &CanvasSession) -> FanoutItem {
        self.remember(session);
        FanoutItem::Update(CanvasUpdate::from_session(session))
    }

    pub fn poll(&mut self, session: &CanvasSession) -> FanoutItem {
        if session.canvas_id == self.canvas_id && session.canvas_name == self.canvas_name {
            return FanoutItem::KeepAlive;
        }
        self.remember(session);
        FanoutItem::Update(CanvasUpdate::from_session(session))
    }

    fn remember(&mut self, session: &CanvasSession) {
        self.canvas_id.clone_from(&session.canvas_id);
        self.canvas_name.clone_from(&session.canvas_name);
    }
}

impl FanoutItem {
    pub fn into_event(self) -> Event {
        match self {
            Self::Update(update) => Event::default()
                .event(CANVAS_UPDATE_EVENT)
                .data(serde_json::to_string(&update).unwrap_or_default()),
            Self::KeepAlive => Event::default().comment(KEEPALIVE_COMMENT),
        }
    }
}

/// Decrements the connection count when axum drops the stream.
struct ConnectionGuard {
    state: Arc<GatewayState>,
}

impl ConnectionGuard {
    fn open(state: Arc<GatewayState>) -> Self {
        let active = state.fanout_opened();
        #[cfg(feature = "metrics")]
        crate::metrics::record_fanout_connect();
        info!(active, "Fan-out consumer connected");
        Self { state }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self.state.fanout_closed();
        #[cfg(feature = "metrics")]
        crate::metrics::record_fanout_disconnect();
        info!(active, "Fan-out consumer disconnected");
    }
}

struct Connection {
    guard: ConnectionGuard,
    last: LastEmitted,
    ticker: Interval,
    connected: bool,
}

pub async fn events_handler(
    State(state): State<Arc<GatewayState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let period = state.poll_interval;
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let conn = Connection {
        guard: ConnectionGuard::open(state),
        last: LastEmitted::default(),
        ticker,
        connected: false,
    };

    let stream = futures::stream::unfold(conn, |mut conn| async move {
        let state = conn.guard.state.clone();
        if state.shutdown.is_cancelled() {
            return None;
        }

        if !conn.connected {
            conn.connected = true;
            let item = conn.last.initial(&state.tracker.snapshot());
            return Some((Ok(item.into_event()), conn));
        }

        tokio::select! {
            _ = state.shutdown.cancelled() => {
                debug!("Fan-out stream closed by shutdown");
                return None;
            }
            _ = conn.ticker.tick() => {}
        }

        let item = conn.last.poll(&state.tracker.snapshot());
        if let FanoutItem::Update(update) = &item {
            debug!(canvas_id = %update.canvas_id, "Fan-out canvas change");
        }
        Some((Ok(item.into_event()), conn))
    });

    Sse::new(stream)
}
