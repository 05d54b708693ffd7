use async_trait::async_trait;
use futures::stream::BoxStream;
use shared::domain::{CollectionName, Document, DocumentId, Fields};

pub mod config;
pub mod dispatch;
pub mod error;
pub mod form;
pub mod memory;
pub mod notify;
pub mod records;
pub mod remote;
pub mod screen;
pub mod sync;

pub use config::{BackoffPolicy, ClientSettings};
pub use dispatch::{MutationDispatcher, MutationTicket};
pub use error::{MutationKind, OperationError, StoreError, SubmitError, ValidationError};
pub use form::{CloseReason, FormMode, ModalController, ModalState};
pub use memory::InMemoryDocumentStore;
pub use notify::{Notification, NotificationLevel, Notifier};
pub use records::{Album, AlbumDraft, Record, User, UserDraft, UserRow};
pub use remote::RemoteDocumentStore;
pub use screen::{AlbumsScreen, CollectionScreen, UsersScreen};
pub use sync::{ListState, LiveCollection, SyncStatus};

/// Ordered snapshots of one collection. The first item is the current
/// contents; each later item replaces it completely.
pub type SnapshotStream = BoxStream<'static, Result<Vec<Document>, StoreError>>;

/// Backend holding the document collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn subscribe(&self, collection: &CollectionName) -> Result<SnapshotStream, StoreError>;

    /// Adds a document and returns the identifier the backend assigned.
    async fn create(
        &self,
        collection: &CollectionName,
        fields: Fields,
    ) -> Result<DocumentId, StoreError>;

    /// Merges `fields` into an existing document.
    async fn update(
        &self,
        collection: &CollectionName,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError>;

    /// Deleting an identifier that does not exist succeeds.
    async fn delete(&self, collection: &CollectionName, id: &DocumentId) -> Result<(), StoreError>;
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
