//! Process-local [`DocumentStore`] used for offline runs and tests.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures::{future, stream, StreamExt};
use shared::{
    domain::{CollectionName, Document, DocumentId, Fields},
    error::ErrorCode,
};
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{error::StoreError, DocumentStore, SnapshotStream};

const CHANGE_BUFFER: usize = 64;

struct Inner {
    collections: Mutex<HashMap<CollectionName, Vec<Document>>>,
    changes: broadcast::Sender<CollectionName>,
}

impl Inner {
    async fn snapshot(&self, collection: &CollectionName) -> Vec<Document> {
        self.collections
            .lock()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn changed(&self, collection: &CollectionName) {
        let _ = self.changes.send(collection.clone());
    }
}

/// Documents kept in insertion order per collection.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            inner: Arc::new(Inner {
                collections: Mutex::new(HashMap::new()),
                changes,
            }),
        }
    }

    pub async fn documents(&self, collection: &CollectionName) -> Vec<Document> {
        self.inner.snapshot(collection).await
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn subscribe(&self, collection: &CollectionName) -> Result<SnapshotStream, StoreError> {
        // Subscribe before reading so no change between the two is missed.
        let rx = self.inner.changes.subscribe();
        let initial = self.inner.snapshot(collection).await;

        let wanted = collection.clone();
        let target = collection.clone();
        let inner = Arc::clone(&self.inner);
        let updates = BroadcastStream::new(rx)
            .filter(move |change| {
                // A lagged receiver may have missed a relevant change.
                future::ready(change.as_ref().map_or(true, |name| *name == wanted))
            })
            .then(move |_| {
                let inner = Arc::clone(&inner);
                let collection = target.clone();
                async move { Ok::<_, StoreError>(inner.snapshot(&collection).await) }
            });

        Ok(stream::once(future::ready(Ok::<_, StoreError>(initial))).chain(updates).boxed())
    }

    async fn create(
        &self,
        collection: &CollectionName,
        fields: Fields,
    ) -> Result<DocumentId, StoreError> {
        let id = DocumentId::new(Uuid::new_v4().simple().to_string());
        self.inner
            .collections
            .lock()
            .await
            .entry(collection.clone())
            .or_default()
            .push(Document::new(id.clone(), fields));
        self.inner.changed(collection);
        Ok(id)
    }

    async fn update(
        &self,
        collection: &CollectionName,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError> {
        {
            let mut collections = self.inner.collections.lock().await;
            let document = collections
                .get_mut(collection)
                .and_then(|documents| documents.iter_mut().find(|doc| &doc.id == id))
                .ok_or_else(|| {
                    StoreError::rejected(ErrorCode::NotFound, format!("document {id} not found"))
                })?;
            document.fields.extend(fields);
        }
        self.inner.changed(collection);
        Ok(())
    }

    async fn delete(&self, collection: &CollectionName, id: &DocumentId) -> Result<(), StoreError> {
        let removed = {
            let mut collections = self.inner.collections.lock().await;
            match collections.get_mut(collection) {
                Some(documents) => {
                    let before = documents.len();
                    documents.retain(|doc| &doc.id != id);
                    documents.len() != before
                }
                None => false,
            }
        };
        if removed {
            self.inner.changed(collection);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
