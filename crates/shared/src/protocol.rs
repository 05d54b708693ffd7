use serde::{Deserialize, Serialize};

use crate::{
    domain::{CollectionName, Document, DocumentId, Fields},
    error::ApiError,
};

/// Messages pushed from the service to collection subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Complete, ordered contents of one collection.
    Snapshot {
        collection: CollectionName,
        documents: Vec<Document>,
    },
    Error(ApiError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocumentRequest {
    pub fields: Fields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocumentResponse {
    pub id: DocumentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDocumentRequest {
    pub fields: Fields,
}
