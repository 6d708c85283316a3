//! Upstream canvas server access.
//!
//! [`CanvasApi`] is the seam between canvas-pilot and the remote server: the
//! tracker uses it to bind its identity and subscribe to workspace changes,
//! the engine to read anchors and widgets and to send mutations.
//! [`http::HttpCanvasApi`] is the reqwest implementation; tests substitute
//! in-memory fakes.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};

use canvas_pilot_model::{NewWidget, Widget, WidgetPatch, WidgetType};

pub mod error;
pub mod http;
pub mod sse;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use error::{ClientError, Result};
pub use http::HttpCanvasApi;

/// Raw body of a long-lived subscription.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A display client registered with the canvas server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: String,
    #[serde(default)]
    pub installation_name: String,
}

/// Operations canvas-pilot needs from the canvas server.
#[async_trait]
pub trait CanvasApi: Send + Sync {
    /// All registered display clients.
    async fn list_clients(&self) -> Result<Vec<ClientInfo>>;

    /// Open the workspace subscription for a client. No request timeout applies.
    async fn subscribe_workspace(&self, client_id: &str) -> Result<ByteStream>;

    /// Every widget on a canvas, from the read-only generic collection.
    async fn list_widgets(&self, canvas_id: &str) -> Result<Vec<Widget>>;

    async fn get_anchor(&self, canvas_id: &str, anchor_id: &str) -> Result<Widget>;

    /// Full record of one widget from its typed endpoint.
    async fn get_widget(
        &self,
        canvas_id: &str,
        widget_type: &WidgetType,
        widget_id: &str,
    ) -> Result<Widget>;

    async fn patch_widget(
        &self,
        canvas_id: &str,
        widget_type: &WidgetType,
        widget_id: &str,
        patch: &WidgetPatch,
    ) -> Result<()>;

    /// Create a widget whose content is carried in the JSON body.
    async fn create_widget(
        &self,
        canvas_id: &str,
        widget_type: &WidgetType,
        body: &NewWidget,
    ) -> Result<()>;

    /// Raw file behind an image, video or PDF.
    async fn download_binary(
        &self,
        canvas_id: &str,
        widget_type: &WidgetType,
        widget_id: &str,
    ) -> Result<Bytes>;

    /// Create a file-backed widget from metadata plus file contents.
    async fn upload_widget(
        &self,
        canvas_id: &str,
        widget_type: &WidgetType,
        body: &NewWidget,
        file_name: &str,
        data: Bytes,
    ) -> Result<()>;

    /// Find the registered client with the given installation name.
    async fn find_client(&self, installation_name: &str) -> Result<Option<ClientInfo>> {
        let clients = self.list_clients().await?;
        Ok(clients
            .into_iter()
            .find(|c| c.installation_name == installation_name))
    }
}
