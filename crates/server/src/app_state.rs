use server_api::ApiContext;
use shared::domain::CollectionName;
use tokio::sync::broadcast;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    /// Names of collections changed by a mutation. Subscribers read the
    /// snapshot themselves after receiving one.
    pub(crate) changes: broadcast::Sender<CollectionName>,
}
