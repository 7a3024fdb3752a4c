//! Serialized project payload and the upload/transmit flow.

use std::future::Future;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::coords::{LngLat, lng_lat_object};
use crate::layout::LayoutGraph;
use crate::net::{NetworkError, check_status, identified};
use crate::text::TextBlock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapState {
    #[serde(with = "lng_lat_object")]
    pub center: LngLat,
    pub zoom: f64,
    pub style_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorEntry {
    pub id: String,
    pub coordinates: LngLat,
    pub icon_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMarkerEntry {
    pub id: String,
    pub coordinates: LngLat,
    pub image_ref: String,
}

/// Everything the backend needs to rebuild the poster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPayload {
    pub map_state: MapState,
    pub anchors: Vec<AnchorEntry>,
    pub image_markers: Vec<ImageMarkerEntry>,
    pub text_content: TextBlock,
}

impl ProjectPayload {
    /// Snapshot the layout. Image references are copied as-is.
    pub fn from_graph(graph: &LayoutGraph, map_state: MapState, text: &TextBlock) -> Self {
        Self {
            map_state,
            anchors: graph
                .anchors()
                .map(|a| AnchorEntry {
                    id: a.id.anchor_key(),
                    coordinates: a.coordinates,
                    icon_ref: a.icon.id().to_string(),
                })
                .collect(),
            image_markers: graph
                .markers()
                .map(|m| ImageMarkerEntry {
                    id: m.id.marker_key(),
                    coordinates: m.coordinates,
                    image_ref: m.image_ref.clone(),
                })
                .collect(),
            text_content: text.clone(),
        }
    }

    pub fn is_durable(&self) -> bool {
        self.image_markers.iter().all(|m| is_durable(&m.image_ref))
    }
}

/// True for references a backend can fetch later (`http`/`https` URLs).
pub fn is_durable(image_ref: &str) -> bool {
    image_ref.starts_with("https://") || image_ref.starts_with("http://")
}

/// Turns a local image reference into a durable URL.
pub trait ImageStore {
    fn persist(&self, image_ref: &str) -> impl Future<Output = Result<String, NetworkError>>;
}

pub trait Transmitter {
    fn send(&self, payload: &ProjectPayload) -> impl Future<Output = Result<(), NetworkError>>;
}

/// User-facing result of a transmit or export attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum Notice {
    Success(String),
    Error(String),
}

/// Upload every non-durable image in parallel and rewrite its reference.
pub async fn persist_images<S: ImageStore>(store: &S, payload: &mut ProjectPayload) -> Result<(), NetworkError> {
    let uploads = join_all(payload.image_markers.iter().map(|m| async move {
        if is_durable(&m.image_ref) {
            Ok(m.image_ref.clone())
        } else {
            store.persist(&m.image_ref).await
        }
    }))
    .await;

    let urls = uploads.into_iter().collect::<Result<Vec<_>, _>>()?;
    for (marker, url) in payload.image_markers.iter_mut().zip(urls) {
        marker.image_ref = url;
    }
    Ok(())
}

/// Resolve images, then post. The payload is consumed; the layout it came from is never touched.
pub async fn transmit<S: ImageStore, T: Transmitter>(
    store: &S,
    transmitter: &T,
    mut payload: ProjectPayload,
) -> Notice {
    let result: Result<(), NetworkError> = async {
        persist_images(store, &mut payload).await?;
        transmitter.send(&payload).await
    }
    .await;

    match result {
        Ok(()) => {
            info!(markers = payload.image_markers.len(), "map data transmitted");
            Notice::Success("Map data successfully transmitted!".to_string())
        }
        Err(e) => {
            error!("error transmitting map data: {}", e);
            Notice::Error("Failed to transmit map data. Please try again.".to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(alias = "secure_url", alias = "secureUrl")]
    url: String,
}

/// Uploads image bytes to an HTTP endpoint answering `{"url": ...}`.
pub struct HttpImageStore {
    client: reqwest::Client,
    upload_url: String,
}

impl HttpImageStore {
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url: upload_url.into(),
        }
    }

    async fn load(&self, image_ref: &str) -> Result<Vec<u8>, NetworkError> {
        if let Some(local) = read_local(image_ref) {
            return local;
        }
        let resp = self.client.get(image_ref).send().await?;
        Ok(check_status(resp)?.bytes().await?.to_vec())
    }
}

/// Native builds reference photos by file path.
#[cfg(not(target_arch = "wasm32"))]
fn read_local(image_ref: &str) -> Option<Result<Vec<u8>, NetworkError>> {
    let path = std::path::Path::new(image_ref);
    if image_ref.contains("://") || image_ref.starts_with("blob:") || !path.exists() {
        return None;
    }
    Some(std::fs::read(path).map_err(|e| NetworkError::Rejected(format!("{}: {}", image_ref, e))))
}

#[cfg(target_arch = "wasm32")]
fn read_local(_image_ref: &str) -> Option<Result<Vec<u8>, NetworkError>> {
    None
}

impl ImageStore for HttpImageStore {
    async fn persist(&self, image_ref: &str) -> Result<String, NetworkError> {
        let bytes = self.load(image_ref).await?;
        let resp = identified(self.client.post(&self.upload_url))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;
        let body: UploadResponse = check_status(resp)?.json().await?;
        if !is_durable(&body.url) {
            return Err(NetworkError::Rejected(format!("upload returned non-durable url {}", body.url)));
        }
        Ok(body.url)
    }
}

/// Posts the payload as JSON.
pub struct HttpTransmitter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransmitter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Transmitter for HttpTransmitter {
    async fn send(&self, payload: &ProjectPayload) -> Result<(), NetworkError> {
        let resp = identified(self.client.post(&self.endpoint)).json(payload).send().await?;
        check_status(resp)?;
        Ok(())
    }
}
