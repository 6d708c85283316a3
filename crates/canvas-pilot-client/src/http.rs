//! reqwest implementation of [`CanvasApi`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use canvas_pilot_core::config::ServerConfig;
use canvas_pilot_model::{NewWidget, Widget, WidgetPatch, WidgetType};

use crate::error::{ClientError, Result};
use crate::{ByteStream, CanvasApi, ClientInfo};

const API_PREFIX: &str = "/api/v1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpCanvasApi {
    pub base_url: String,
    /// Discrete calls, bounded by the configured request timeout.
    client: reqwest::Client,
    /// Subscriptions; only connecting is bounded.
    stream_client: reqwest::Client,
}

impl HttpCanvasApi {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let headers = auth_headers(&config.auth_header, config.resolve_token())?;

        let client = reqwest::Client::builder()
            .default_headers(headers.clone())
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        let stream_client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            stream_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }

    fn widget_url(&self, canvas_id: &str, widget_type: &WidgetType, widget_id: &str) -> Result<String> {
        let kind = endpoint(widget_type)?;
        Ok(self.url(&format!("/canvases/{canvas_id}/{kind}/{widget_id}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        trace!(url, "GET");
        let response = check(self.client.get(url).send().await?).await?;
        decode(response).await
    }
}

fn auth_headers(header: &str, token: Option<String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        let name = HeaderName::from_bytes(header.as_bytes())
            .map_err(|e| ClientError::Config(format!("invalid auth header '{header}': {e}")))?;
        let mut value = HeaderValue::from_str(&token)
            .map_err(|e| ClientError::Config(format!("invalid token: {e}")))?;
        value.set_sensitive(true);
        headers.insert(name, value);
    }
    Ok(headers)
}

fn endpoint(widget_type: &WidgetType) -> Result<&'static str> {
    widget_type
        .endpoint()
        .ok_or_else(|| ClientError::Unsupported(widget_type.to_string()))
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status { status, body })
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

#[async_trait]
impl CanvasApi for HttpCanvasApi {
    async fn list_clients(&self) -> Result<Vec<ClientInfo>> {
        self.get_json(&self.url("/clients")).await
    }

    async fn subscribe_workspace(&self, client_id: &str) -> Result<ByteStream> {
        let url = self.url(&format!("/clients/{client_id}/workspaces?subscribe"));
        debug!(url = %url, "Opening workspace subscription");
        let response = check(self.stream_client.get(&url).send().await?).await?;
        let bytes = response.bytes_stream().map(|chunk| chunk.map_err(ClientError::from));
        Ok(Box::pin(bytes))
    }

    async fn list_widgets(&self, canvas_id: &str) -> Result<Vec<Widget>> {
        self.get_json(&self.url(&format!("/canvases/{canvas_id}/widgets")))
            .await
    }

    async fn get_anchor(&self, canvas_id: &str, anchor_id: &str) -> Result<Widget> {
        self.get_json(&self.url(&format!("/canvases/{canvas_id}/anchors/{anchor_id}")))
            .await
    }

    async fn get_widget(
        &self,
        canvas_id: &str,
        widget_type: &WidgetType,
        widget_id: &str,
    ) -> Result<Widget> {
        let url = self.widget_url(canvas_id, widget_type, widget_id)?;
        self.get_json(&url).await
    }

    async fn patch_widget(
        &self,
        canvas_id: &str,
        widget_type: &WidgetType,
        widget_id: &str,
        patch: &WidgetPatch,
    ) -> Result<()> {
        let url = self.widget_url(canvas_id, widget_type, widget_id)?;
        trace!(url = %url, "PATCH");
        check(self.client.patch(&url).json(patch).send().await?).await?;
        Ok(())
    }

    async fn create_widget(
        &self,
        canvas_id: &str,
        widget_type: &WidgetType,
        body: &NewWidget,
    ) -> Result<()> {
        let kind = endpoint(widget_type)?;
        let url = self.url(&format!("/canvases/{canvas_id}/{kind}"));
        trace!(url = %url, "POST");
        check(self.client.post(&url).json(body).send().await?).await?;
        Ok(())
    }

    async fn download_binary(
        &self,
        canvas_id: &str,
        widget_type: &WidgetType,
        widget_id: &str,
    ) -> Result<Bytes> {
        let url = format!("{}/download", self.widget_url(canvas_id, widget_type, widget_id)?);
        trace!(url = %url, "GET binary");
        let response = check(self.client.get(&url).send().await?).await?;
        Ok(response.bytes().await?)
    }

    async fn upload_widget(
        &self,
        canvas_id: &str,
        widget_type: &WidgetType,
        body: &NewWidget,
        file_name: &str,
        data: Bytes,
    ) -> Result<()> {
        let kind = endpoint(widget_type)?;
        let url = self.url(&format!("/canvases/{canvas_id}/{kind}"));

        let json = serde_json::to_string(body).map_err(|e| ClientError::Decode(e.to_string()))?;
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let form = Form::new()
            .part("json", Part::text(json).mime_str("application/json")?)
            .part(
                "data",
                Part::stream(data)
                    .file_name(file_name.to_string())
                    .mime_str(mime.essence_str())?,
            );

        trace!(url = %url, file_name, "POST multipart");
        check(self.client.post(&url).multipart(form).send().await?).await?;
        Ok(())
    }
}
