//! [`DocumentStore`] backed by the document-store service over HTTP and WebSocket.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{future, StreamExt};
use reqwest::{Client, Response, StatusCode};
use shared::{
    domain::{CollectionName, DocumentId, Fields},
    error::{ApiError, ErrorCode},
    protocol::{CreateDocumentRequest, CreateDocumentResponse, ServerEvent, UpdateDocumentRequest},
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

use crate::{error::StoreError, DocumentStore, SnapshotStream};

#[derive(Clone)]
pub struct RemoteDocumentStore {
    http: Client,
    server_url: String,
    ws_url: String,
}

impl RemoteDocumentStore {
    /// `server_url` must be an `http://` or `https://` base URL.
    pub fn new(server_url: &str) -> Result<Self> {
        let parsed = Url::parse(server_url)
            .with_context(|| format!("invalid server url: {server_url}"))?;
        let server_url = parsed.as_str().trim_end_matches('/').to_string();
        let ws_url = if server_url.starts_with("https://") {
            server_url.replacen("https://", "wss://", 1)
        } else if server_url.starts_with("http://") {
            server_url.replacen("http://", "ws://", 1)
        } else {
            return Err(anyhow!("server_url must start with http:// or https://"));
        };
        Ok(Self {
            http: Client::new(),
            server_url,
            ws_url,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn documents_url(&self, collection: &CollectionName) -> String {
        format!("{}/collections/{collection}/documents", self.server_url)
    }

    fn document_url(&self, collection: &CollectionName, id: &DocumentId) -> String {
        format!(
            "{}/collections/{collection}/documents/{}",
            self.server_url,
            urlencode_segment(id.as_str())
        )
    }
}

fn urlencode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn transport_error(err: reqwest::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        status if status.is_client_error() => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    }
}

/// Maps non-success responses to [`StoreError::Rejected`], preferring the
/// service's own error body when it has one.
async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.map_err(transport_error)?;
    let error = serde_json::from_slice::<ApiError>(&body).unwrap_or_else(|_| {
        ApiError::new(code_for_status(status), status.to_string())
    });
    Err(StoreError::rejected(error.code, error.message))
}

fn decode_frame(frame: Message) -> Option<Result<Vec<shared::domain::Document>, StoreError>> {
    match frame {
        Message::Text(text) => match serde_json::from_str::<ServerEvent>(&text) {
            Ok(ServerEvent::Snapshot { documents, .. }) => Some(Ok(documents)),
            Ok(ServerEvent::Error(error)) => Some(Err(StoreError::rejected(error.code, error.message))),
            Err(err) => Some(Err(StoreError::InvalidPayload(err.to_string()))),
        },
        Message::Close(frame) => {
            debug!(?frame, "subscription closed by server");
            Some(Err(StoreError::StreamEnded))
        }
        _ => None,
    }
}

#[async_trait]
impl DocumentStore for RemoteDocumentStore {
    async fn subscribe(&self, collection: &CollectionName) -> Result<SnapshotStream, StoreError> {
        let ws_url = format!("{}/collections/{collection}/ws", self.ws_url);
        let (ws_stream, _) = connect_async(&ws_url).await.map_err(|err| {
            warn!(%ws_url, error = %err, "failed to connect websocket");
            StoreError::Unavailable(err.to_string())
        })?;
        let frames = ws_stream.filter_map(|frame| {
            future::ready(match frame {
                Ok(frame) => decode_frame(frame),
                Err(err) => Some(Err(StoreError::Unavailable(err.to_string()))),
            })
        });
        Ok(frames.boxed())
    }

    async fn create(
        &self,
        collection: &CollectionName,
        fields: Fields,
    ) -> Result<DocumentId, StoreError> {
        let response = self
            .http
            .post(self.documents_url(collection))
            .json(&CreateDocumentRequest { fields })
            .send()
            .await
            .map_err(transport_error)?;
        let created: CreateDocumentResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|err| StoreError::InvalidPayload(err.to_string()))?;
        Ok(created.id)
    }

    async fn update(
        &self,
        collection: &CollectionName,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let response = self
            .http
            .patch(self.document_url(collection, id))
            .json(&UpdateDocumentRequest { fields })
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete(&self, collection: &CollectionName, id: &DocumentId) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(self.document_url(collection, id))
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
