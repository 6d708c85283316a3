//! Gateway shared state.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use canvas_pilot_client::CanvasApi;
use canvas_pilot_core::config::Config;
use canvas_pilot_engine::{MacroEngine, RetryPolicy};
use canvas_pilot_tracker::SessionTracker;

/// Shared gateway state accessible from all handlers.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub tracker: Arc<SessionTracker>,
    pub engine: Arc<MacroEngine>,
    /// Fires on service shutdown; ends the tracker and every fan-out stream.
    pub shutdown: CancellationToken,
    pub poll_interval: Duration,
    pub started_at: Instant,
    fanout_connections: AtomicUsize,
    #[cfg(feature = "metrics")]
    pub metrics_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl GatewayState {
    pub fn new(
        config: Arc<Config>,
        tracker: Arc<SessionTracker>,
        engine: Arc<MacroEngine>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            config,
            tracker,
            engine,
            shutdown,
            started_at: Instant::now(),
            fanout_connections: AtomicUsize::new(0),
            #[cfg(feature = "metrics")]
            metrics_handle: None,
        }
    }

    /// Wire a tracker and an engine around one upstream client.
    pub fn build(config: Arc<Config>, api: Arc<dyn CanvasApi>, shutdown: CancellationToken) -> Self {
        let tracker = Arc::new(SessionTracker::from_config(api.clone(), &config, &shutdown));
        let engine = Arc::new(MacroEngine::new(
            api,
            tracker.subscribe(),
            RetryPolicy::from(&config.macros()),
        ));
        Self::new(config, tracker, engine, shutdown)
    }

    pub fn fanout_connections(&self) -> usize {
        self.fanout_connections.load(Ordering::SeqCst)
    }

    pub(crate) fn fanout_opened(&self) -> usize {
        self.fanout_connections.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn fanout_closed(&self) -> usize {
        self.fanout_connections.fetch_sub(1, Ordering::SeqCst) - 1
    }
}
