//! In-memory [`CanvasApi`] for tracker, engine and gateway tests.
//!
//! Widgets live in one list per canvas. Listing strips `background_color`
//! like the real generic collection does, so callers that need it must
//! fetch the typed record. Subscriptions are scripted: each call to
//! `subscribe_workspace` pops the next queued stream, and an empty queue
//! yields a stream that never produces anything.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use canvas_pilot_model::{NewWidget, Widget, WidgetPatch, WidgetType};

use crate::error::{ClientError, Result};
use crate::{ByteStream, CanvasApi, ClientInfo};

/// A widget created through the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    pub canvas_id: String,
    pub widget_type: WidgetType,
    pub body: NewWidget,
    /// File name and contents for multipart uploads.
    pub upload: Option<(String, Bytes)>,
}

#[derive(Default)]
pub struct MockCanvasApi {
    clients: Mutex<Vec<ClientInfo>>,
    clients_fail: AtomicBool,
    subscriptions: Mutex<VecDeque<Result<ByteStream>>>,
    subscribe_calls: AtomicUsize,
    widgets: Mutex<HashMap<String, Vec<Widget>>>,
    binaries: Mutex<HashMap<String, Bytes>>,
    failing: Mutex<HashSet<String>>,
    patch_attempts: Mutex<HashMap<String, usize>>,
    patches: Mutex<Vec<(String, WidgetPatch)>>,
    created: Mutex<Vec<Created>>,
    patch_delay: Mutex<Option<Duration>>,
}

fn not_found(what: &str) -> ClientError {
    ClientError::Status {
        status: 404,
        body: format!("{what} not found"),
    }
}

impl MockCanvasApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(self, id: &str, installation_name: &str) -> Self {
        self.clients.lock().unwrap().push(ClientInfo {
            id: id.into(),
            installation_name: installation_name.into(),
        });
        self
    }

    pub fn with_widget(self, canvas_id: &str, widget: Widget) -> Self {
        self.widgets
            .lock()
            .unwrap()
            .entry(canvas_id.into())
            .or_default()
            .push(widget);
        self
    }

    pub fn with_binary(self, widget_id: &str, data: &'static [u8]) -> Self {
        self.binaries
            .lock()
            .unwrap()
            .insert(widget_id.into(), Bytes::from_static(data));
        self
    }

    /// Make every mutation of this widget fail with a 500.
    pub fn with_failing(self, widget_id: &str) -> Self {
        self.failing.lock().unwrap().insert(widget_id.into());
        self
    }

    /// Slow every `patch_widget` call down by `delay`.
    pub fn with_patch_delay(self, delay: Duration) -> Self {
        *self.patch_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Make `list_clients` fail with a 401.
    pub fn fail_clients(&self) {
        self.clients_fail.store(true, Ordering::SeqCst);
    }

    /// Queue a subscription that yields `lines` and then ends.
    pub fn push_frames(&self, lines: &[&str]) {
        let chunks: Vec<Result<Bytes>> = lines
            .iter()
            .map(|l| Ok(Bytes::from(format!("{l}\n"))))
            .collect();
        self.subscriptions
            .lock()
            .unwrap()
            .push_back(Ok(Box::pin(futures::stream::iter(chunks))));
    }

    /// Queue a subscription fed by the returned sender; dropping it ends the stream.
    pub fn push_live(&self) -> mpsc::UnboundedSender<Result<Bytes>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriptions
            .lock()
            .unwrap()
            .push_back(Ok(Box::pin(UnboundedReceiverStream::new(rx))));
        tx
    }

    /// Queue a subscription attempt that is refused with `status`.
    pub fn push_refused(&self, status: u16) {
        self.subscriptions.lock().unwrap().push_back(Err(ClientError::Status {
            status,
            body: "refused".into(),
        }));
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn patch_attempts(&self, widget_id: &str) -> usize {
        self.patch_attempts
            .lock()
            .unwrap()
            .get(widget_id)
            .copied()
            .unwrap_or(0)
    }

    /// Successful patches in the order they were applied.
    pub fn patches(&self) -> Vec<(String, WidgetPatch)> {
        self.patches.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<Created> {
        self.created.lock().unwrap().clone()
    }

    /// Current stored state of a widget.
    pub fn widget(&self, canvas_id: &str, widget_id: &str) -> Option<Widget> {
        self.widgets
            .lock()
            .unwrap()
            .get(canvas_id)?
            .iter()
            .find(|w| w.id == widget_id)
            .cloned()
    }

    fn mutation_allowed(&self, widget_id: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(widget_id) {
            return Err(ClientError::Status {
                status: 500,
                body: "mutation rejected".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CanvasApi for MockCanvasApi {
    async fn list_clients(&self) -> Result<Vec<ClientInfo>> {
        if self.clients_fail.load(Ordering::SeqCst) {
            return Err(ClientError::Status {
                status: 401,
                body: "bad token".into(),
            });
        }
        Ok(self.clients.lock().unwrap().clone())
    }

    async fn subscribe_workspace(&self, _client_id: &str) -> Result<ByteStream> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        match self.subscriptions.lock().unwrap().pop_front() {
            Some(next) => next,
            None => Ok(Box::pin(futures::stream::pending::<Result<Bytes>>())),
        }
    }

    async fn list_widgets(&self, canvas_id: &str) -> Result<Vec<Widget>> {
        let widgets = self.widgets.lock().unwrap();
        Ok(widgets
            .get(canvas_id)
            .map(|list| {
                list.iter()
                    .map(|w| Widget {
                        background_color: None,
                        ..w.clone()
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_anchor(&self, canvas_id: &str, anchor_id: &str) -> Result<Widget> {
        self.widget(canvas_id, anchor_id)
            .filter(|w| w.widget_type == WidgetType::Anchor)
            .ok_or_else(|| not_found("anchor"))
    }

    async fn get_widget(
        &self,
        canvas_id: &str,
        widget_type: &WidgetType,
        widget_id: &str,
    ) -> Result<Widget> {
        self.widget(canvas_id, widget_id)
            .filter(|w| &w.widget_type == widget_type)
            .ok_or_else(|| not_found("widget"))
    }

    async fn patch_widget(
        &self,
        canvas_id: &str,
        widget_type: &WidgetType,
        widget_id: &str,
        patch: &WidgetPatch,
    ) -> Result<()> {
        if widget_type.endpoint().is_none() {
            return Err(ClientError::Unsupported(widget_type.to_string()));
        }
        let delay = *self.patch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        *self
            .patch_attempts
            .lock()
            .unwrap()
            .entry(widget_id.into())
            .or_default() += 1;
        self.mutation_allowed(widget_id)?;

        let mut widgets = self.widgets.lock().unwrap();
        let widget = widgets
            .get_mut(canvas_id)
            .and_then(|list| list.iter_mut().find(|w| w.id == widget_id))
            .ok_or_else(|| not_found("widget"))?;
        if let Some(location) = patch.location {
            widget.location = location;
        }
        if let Some(scale) = patch.scale {
            widget.scale = Some(scale);
        }
        if let Some(pinned) = patch.pinned {
            widget.pinned = pinned;
        }
        self.patches
            .lock()
            .unwrap()
            .push((widget_id.to_string(), patch.clone()));
        Ok(())
    }

    async fn create_widget(
        &self,
        canvas_id: &str,
        widget_type: &WidgetType,
        body: &NewWidget,
    ) -> Result<()> {
        if widget_type.endpoint().is_none() {
            return Err(ClientError::Unsupported(widget_type.to_string()));
        }
        self.created.lock().unwrap().push(Created {
            canvas_id: canvas_id.into(),
            widget_type: widget_type.clone(),
            body: body.clone(),
            upload: None,
        });
        Ok(())
    }

    async fn download_binary(
        &self,
        _canvas_id: &str,
        _widget_type: &WidgetType,
        widget_id: &str,
    ) -> Result<Bytes> {
        self.binaries
            .lock()
            .unwrap()
            .get(widget_id)
            .cloned()
            .ok_or_else(|| not_found("binary"))
    }

    async fn upload_widget(
        &self,
        canvas_id: &str,
        widget_type: &WidgetType,
        body: &NewWidget,
        file_name: &str,
        data: Bytes,
    ) -> Result<()> {
        self.created.lock().unwrap().push(Created {
            canvas_id: canvas_id.into(),
            widget_type: widget_type.clone(),
            body: body.clone(),
            upload: Some((file_name.into(), data)),
        });
        Ok(())
    }
}
