//! Live, self-healing view over one collection.

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::{
    sync::{watch, Notify},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    config::BackoffPolicy,
    error::StoreError,
    notify::{NotificationLevel, Notifier},
    records::Record,
    DocumentStore,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    Connecting,
    Live,
    /// The subscription failed; the last good list is still shown.
    Lost {
        attempt: u32,
        error: StoreError,
        retry_in: Duration,
    },
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListState<R> {
    /// Records in the order of the most recent snapshot.
    pub records: Vec<R>,
    /// Set once the first snapshot has been applied.
    pub loaded: bool,
    pub status: SyncStatus,
    /// Incremented on every applied snapshot.
    pub revision: u64,
}

impl<R> Default for ListState<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            loaded: false,
            status: SyncStatus::Connecting,
            revision: 0,
        }
    }
}

/// Keeps a local copy of `R::COLLECTION` equal to the backend's latest snapshot.
///
/// The subscription is re-established with backoff whenever it fails. After
/// [`LiveCollection::stop`] no further snapshot is applied.
pub struct LiveCollection<R: Record> {
    state: Arc<watch::Sender<ListState<R>>>,
    wake: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl<R: Record> LiveCollection<R> {
    pub fn start(store: Arc<dyn DocumentStore>, notifier: Notifier, policy: BackoffPolicy) -> Self {
        let (tx, _) = watch::channel(ListState::default());
        let state = Arc::new(tx);
        let wake = Arc::new(Notify::new());
        let task = tokio::spawn(run_subscription::<R>(
            store,
            Arc::clone(&state),
            notifier,
            policy,
            Arc::clone(&wake),
        ));
        Self {
            state,
            wake,
            task: Some(task),
        }
    }

    pub fn records(&self) -> Vec<R> {
        self.state.borrow().records.clone()
    }

    pub fn state(&self) -> ListState<R> {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ListState<R>> {
        self.state.subscribe()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.borrow().loaded
    }

    pub fn status(&self) -> SyncStatus {
        self.state.borrow().status.clone()
    }

    /// Skips the remaining backoff delay if the subscription is currently lost.
    pub fn resubscribe(&self) {
        self.wake.notify_waiters();
    }

    /// Resolves with the first state matching `predicate`, or `None` once the
    /// collection is stopped without a match.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&ListState<R>) -> bool,
    ) -> Option<ListState<R>> {
        let mut rx = self.state.subscribe();
        let mut matched = false;
        let state = rx
            .wait_for(|state| {
                matched = predicate(state);
                matched || state.status == SyncStatus::Stopped
            })
            .await
            .ok()?;
        matched.then(|| state.clone())
    }

    /// Ends the subscription. Returns `false` if it was already stopped.
    pub fn stop(&mut self) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if state.status == SyncStatus::Stopped {
                return false;
            }
            state.status = SyncStatus::Stopped;
            true
        });
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if changed {
            debug!(collection = %R::COLLECTION, "live collection stopped");
        }
        changed
    }
}

impl<R: Record> Drop for LiveCollection<R> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn decode_snapshot<R: Record>(documents: Vec<shared::domain::Document>) -> Vec<R> {
    documents
        .into_iter()
        .filter_map(|document| match R::from_document(document) {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(collection = %R::COLLECTION, %error, "skipping malformed document");
                None
            }
        })
        .collect()
}

async fn run_subscription<R: Record>(
    store: Arc<dyn DocumentStore>,
    state: Arc<watch::Sender<ListState<R>>>,
    notifier: Notifier,
    policy: BackoffPolicy,
    wake: Arc<Notify>,
) {
    let collection = R::COLLECTION;
    let mut attempt: u32 = 0;

    loop {
        let error = match store.subscribe(&collection).await {
            Ok(mut stream) => loop {
                match stream.next().await {
                    Some(Ok(documents)) => {
                        let records = decode_snapshot::<R>(documents);
                        let applied = state.send_if_modified(|current| {
                            if current.status == SyncStatus::Stopped {
                                return false;
                            }
                            current.records = records;
                            current.loaded = true;
                            current.status = SyncStatus::Live;
                            current.revision += 1;
                            true
                        });
                        if !applied {
                            return;
                        }
                        if attempt > 0 {
                            info!(%collection, attempt, "subscription restored");
                            notifier.notify(
                                NotificationLevel::Info,
                                &collection,
                                "Sync restored",
                                None,
                            );
                            attempt = 0;
                        }
                    }
                    Some(Err(error)) => break error,
                    None => break StoreError::StreamEnded,
                }
            },
            Err(error) => error,
        };

        attempt = attempt.saturating_add(1);
        let retry_in = policy.delay(attempt);
        warn!(%collection, attempt, %error, ?retry_in, "subscription lost");

        // Registered before the status change so a resubscribe issued as soon
        // as `Lost` is observable still wakes this task.
        let woken = wake.notified();
        let message = format!("Sync lost: {error}");
        let marked = state.send_if_modified(|current| {
            if current.status == SyncStatus::Stopped {
                return false;
            }
            current.status = SyncStatus::Lost {
                attempt,
                error,
                retry_in,
            };
            true
        });
        if !marked {
            return;
        }
        if attempt == 1 {
            notifier.notify(NotificationLevel::Error, &collection, message, None);
        }

        tokio::select! {
            _ = tokio::time::sleep(retry_in) => {}
            _ = woken => debug!(%collection, "resubscribe requested"),
        }
    }
}

#[cfg(test)]
#[path = "tests/sync_tests.rs"]
mod tests;
