//! Session tracker: which canvas is this installation's client showing?
//!
//! On start the tracker resolves its installation name, finds the matching
//! client on the canvas server and follows that client's workspace
//! subscription for the life of the process. If binding fails the tracker
//! stays in degraded mode: empty ids, never connected, no retries.
//!
//! The current [`CanvasSession`] lives in a `watch` channel. The
//! subscription task owns the only sender; everyone else reads snapshots.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use canvas_pilot_client::sse::parse_data_lines;
use canvas_pilot_client::{CanvasApi, ClientError};
use canvas_pilot_core::config::Config;
use canvas_pilot_core::identity::resolve_installation_name;
use canvas_pilot_core::session::{CanvasEvent, CanvasSession};

pub struct SessionTracker {
    api: Arc<dyn CanvasApi>,
    installation_name: String,
    reconnect_delay: Duration,
    session: watch::Receiver<CanvasSession>,
    sender: Mutex<Option<watch::Sender<CanvasSession>>>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SessionTracker {
    /// `shutdown` is the service-wide token; the tracker stops when it fires.
    pub fn new(
        api: Arc<dyn CanvasApi>,
        installation_name: impl Into<String>,
        reconnect_delay: Duration,
        shutdown: &CancellationToken,
    ) -> Self {
        let (tx, rx) = watch::channel(CanvasSession::default());
        Self {
            api,
            installation_name: installation_name.into(),
            reconnect_delay,
            session: rx,
            sender: Mutex::new(Some(tx)),
            cancel: shutdown.child_token(),
            handle: Mutex::new(None),
        }
    }

    /// Build a tracker from configuration, resolving the installation name.
    pub fn from_config(
        api: Arc<dyn CanvasApi>,
        config: &Config,
        shutdown: &CancellationToken,
    ) -> Self {
        Self::new(
            api,
            resolve_installation_name(config),
            config.reconnect_delay(),
            shutdown,
        )
    }

    /// Bind to the remote client and spawn the subscription loop.
    ///
    /// Never fails: a failed bind is logged and leaves the tracker degraded.
    /// Calling `start` again is a no-op.
    pub async fn start(&self) {
        let Some(tx) = self.sender.lock().await.take() else {
            debug!("Session tracker already started");
            return;
        };

        let client = match self.api.find_client(&self.installation_name).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                warn!(
                    installation_name = %self.installation_name,
                    "No canvas client registered under this installation name; tracker degraded"
                );
                return;
            }
            Err(e) => {
                warn!(
                    installation_name = %self.installation_name,
                    error = %e,
                    "Failed to look up canvas client; tracker degraded"
                );
                return;
            }
        };

        info!(
            client_id = %client.id,
            installation_name = %self.installation_name,
            "Bound to canvas client"
        );
        tx.send_replace(CanvasSession::bound(&client.id, &self.installation_name));

        let handle = tokio::spawn(subscription_loop(
            self.api.clone(),
            client.id,
            self.reconnect_delay,
            tx,
            self.cancel.clone(),
        ));
        *self.handle.lock().await = Some(handle);
    }

    /// Cancel the subscription loop and wait for it to finish.
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Subscription task failed to join");
            }
        }
    }

    pub fn installation_name(&self) -> &str {
        &self.installation_name
    }

    pub fn canvas_id(&self) -> String {
        self.session.borrow().canvas_id.clone()
    }

    pub fn canvas_name(&self) -> String {
        self.session.borrow().canvas_name.clone()
    }

    pub fn client_id(&self) -> String {
        self.session.borrow().client_id.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.session.borrow().connected
    }

    /// Point-in-time copy of the whole session.
    pub fn snapshot(&self) -> CanvasSession {
        self.session.borrow().clone()
    }

    /// A receiver that observes every session change.
    pub fn subscribe(&self) -> watch::Receiver<CanvasSession> {
        self.session.clone()
    }
}

async fn subscription_loop(
    api: Arc<dyn CanvasApi>,
    client_id: String,
    reconnect_delay: Duration,
    tx: watch::Sender<CanvasSession>,
    cancel: CancellationToken,
) {
    loop {
        match follow_workspace(api.as_ref(), &client_id, &tx, &cancel).await {
            Ok(()) if cancel.is_cancelled() => break,
            Ok(()) => info!(client_id = %client_id, "Workspace subscription ended"),
            Err(e) => warn!(client_id = %client_id, error = %e, "Workspace subscription failed"),
        }

        tx.send_if_modified(|session| std::mem::replace(&mut session.connected, false));

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => {
                debug!(client_id = %client_id, "Reconnecting workspace subscription");
            }
        }
    }

    tx.send_if_modified(|session| std::mem::replace(&mut session.connected, false));
    debug!(client_id = %client_id, "Subscription loop stopped");
}

/// Follow one subscription until it ends, fails or is cancelled.
async fn follow_workspace(
    api: &dyn CanvasApi,
    client_id: &str,
    tx: &watch::Sender<CanvasSession>,
    cancel: &CancellationToken,
) -> Result<(), ClientError> {
    let bytes = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        opened = api.subscribe_workspace(client_id) => opened?,
    };

    let frames = parse_data_lines(bytes);
    tokio::pin!(frames);

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            next = frames.next() => next,
        };

        match next {
            Some(Ok(payload)) => match CanvasEvent::from_frame(&payload) {
                Some(event) => {
                    debug!(
                        canvas_id = %event.canvas_id,
                        canvas_name = %event.canvas_name,
                        "Active canvas update"
                    );
                    tx.send_modify(|session| session.apply(event));
                }
                None => trace!(payload = %payload, "Ignoring workspace frame"),
            },
            Some(Err(e)) => return Err(e),
            None => return Ok(()),
        }
    }
}
