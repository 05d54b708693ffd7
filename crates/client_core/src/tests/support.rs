use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use shared::domain::{CollectionName, Document, DocumentId, Fields};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    error::StoreError,
    notify::{Notification, NotificationLevel},
    DocumentStore, SnapshotStream,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Subscribe(CollectionName),
    Create(CollectionName, Fields),
    Update(CollectionName, DocumentId, Fields),
    Delete(CollectionName, DocumentId),
}

type Feed = mpsc::UnboundedSender<Result<Vec<Document>, StoreError>>;

/// Store double: records every call, lets tests push snapshots by hand and
/// injects failures.
#[derive(Default)]
pub(crate) struct ScriptedStore {
    calls: Mutex<Vec<Call>>,
    feeds: Mutex<Vec<Feed>>,
    subscribe_failures: Mutex<VecDeque<StoreError>>,
    mutation_failure: Mutex<Option<StoreError>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    next_id: Mutex<u32>,
}

impl ScriptedStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls").clone()
    }

    pub(crate) fn mutation_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::Subscribe(_)))
            .collect()
    }

    pub(crate) fn feed_count(&self) -> usize {
        self.feeds.lock().expect("feeds").len()
    }

    /// Waits until `count` subscriptions have been established.
    pub(crate) async fn wait_for_feeds(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.feed_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscription was not established");
    }

    pub(crate) fn subscribe_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Subscribe(_)))
            .count()
    }

    /// Delivers a snapshot on the most recent subscription.
    pub(crate) fn push(&self, documents: Vec<Document>) {
        self.send(Ok(documents));
    }

    /// Fails the most recent subscription's stream.
    pub(crate) fn break_stream(&self, error: StoreError) {
        self.send(Err(error));
    }

    fn send(&self, item: Result<Vec<Document>, StoreError>) {
        let feeds = self.feeds.lock().expect("feeds");
        let feed = feeds.last().expect("no active subscription");
        feed.send(item).expect("subscriber gone");
    }

    pub(crate) fn fail_next_subscribe(&self, error: StoreError) {
        self.subscribe_failures
            .lock()
            .expect("failures")
            .push_back(error);
    }

    pub(crate) fn fail_mutations(&self, error: StoreError) {
        *self.mutation_failure.lock().expect("failure") = Some(error);
    }

    /// Mutations block until a permit is added to the returned semaphore.
    pub(crate) fn hold_mutations(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().expect("gate") = Some(Arc::clone(&gate));
        gate
    }

    async fn mutation(&self, call: Call) -> Result<(), StoreError> {
        self.calls.lock().expect("calls").push(call);
        let gate = self.gate.lock().expect("gate").clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        match self.mutation_failure.lock().expect("failure").clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn subscribe(&self, collection: &CollectionName) -> Result<SnapshotStream, StoreError> {
        self.calls
            .lock()
            .expect("calls")
            .push(Call::Subscribe(collection.clone()));
        if let Some(error) = self.subscribe_failures.lock().expect("failures").pop_front() {
            return Err(error);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().expect("feeds").push(tx);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn create(
        &self,
        collection: &CollectionName,
        fields: Fields,
    ) -> Result<DocumentId, StoreError> {
        self.mutation(Call::Create(collection.clone(), fields)).await?;
        let mut next = self.next_id.lock().expect("ids");
        *next += 1;
        Ok(DocumentId::new(format!("d{next}")))
    }

    async fn update(
        &self,
        collection: &CollectionName,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.mutation(Call::Update(collection.clone(), id.clone(), fields))
            .await
    }

    async fn delete(&self, collection: &CollectionName, id: &DocumentId) -> Result<(), StoreError> {
        self.mutation(Call::Delete(collection.clone(), id.clone()))
            .await
    }
}

pub(crate) fn doc(id: &str, fields: Value) -> Document {
    Document::new(id, fields.as_object().cloned().expect("object fields"))
}

pub(crate) async fn next_notification(
    rx: &mut broadcast::Receiver<Notification>,
) -> Notification {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("notification timed out")
        .expect("notification channel")
}

pub(crate) async fn next_notification_at(
    rx: &mut broadcast::Receiver<Notification>,
    level: NotificationLevel,
) -> Notification {
    loop {
        let notification = next_notification(rx).await;
        if notification.level == level {
            return notification;
        }
    }
}
