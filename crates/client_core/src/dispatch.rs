//! Fire-and-forget create/update/delete with a single outcome notification.

use std::{marker::PhantomData, sync::Arc, time::Duration};

use shared::domain::{CollectionName, DocumentId, Fields};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::{MutationKind, OperationError, ValidationError},
    form::FormMode,
    notify::{NotificationLevel, Notifier},
    records::Record,
    DocumentStore,
};

enum Mutation {
    Create(Fields),
    Update(DocumentId, Fields),
    Delete(DocumentId),
}

impl Mutation {
    fn kind(&self) -> MutationKind {
        match self {
            Mutation::Create(_) => MutationKind::Create,
            Mutation::Update(..) => MutationKind::Update,
            Mutation::Delete(_) => MutationKind::Delete,
        }
    }

    fn target(&self) -> Option<DocumentId> {
        match self {
            Mutation::Create(_) => None,
            Mutation::Update(id, _) | Mutation::Delete(id) => Some(id.clone()),
        }
    }

    async fn apply(
        self,
        store: &dyn DocumentStore,
        collection: &CollectionName,
    ) -> Result<Option<DocumentId>, crate::error::StoreError> {
        match self {
            Mutation::Create(fields) => store.create(collection, fields).await.map(Some),
            Mutation::Update(id, fields) => store.update(collection, &id, fields).await.map(|()| None),
            Mutation::Delete(id) => store.delete(collection, &id).await.map(|()| None),
        }
    }
}

/// Counts a mutation as in flight from issue until its task finishes or is aborted.
struct InFlightGuard(Arc<watch::Sender<usize>>);

impl InFlightGuard {
    fn enter(counter: &Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Handle to an issued mutation. Dropping it does not cancel the call.
#[derive(Debug)]
pub struct MutationTicket {
    token: Uuid,
    kind: MutationKind,
    target: Option<DocumentId>,
    handle: JoinHandle<Result<Option<DocumentId>, OperationError>>,
}

impl MutationTicket {
    /// Correlates the ticket with the notification its outcome produces.
    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn target(&self) -> Option<&DocumentId> {
        self.target.as_ref()
    }

    /// Waits for completion. A successful create yields the new identifier.
    pub async fn outcome(self) -> Result<Option<DocumentId>, OperationError> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(_) => Err(OperationError::Cancelled { kind: self.kind }),
        }
    }
}

pub struct MutationDispatcher<R: Record> {
    store: Arc<dyn DocumentStore>,
    notifier: Notifier,
    timeout: Duration,
    in_flight: Arc<watch::Sender<usize>>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for MutationDispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: self.notifier.clone(),
            timeout: self.timeout,
            in_flight: Arc::clone(&self.in_flight),
            _record: PhantomData,
        }
    }
}

impl<R: Record> MutationDispatcher<R> {
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Notifier, timeout: Duration) -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            store,
            notifier,
            timeout,
            in_flight: Arc::new(in_flight),
            _record: PhantomData,
        }
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    pub fn watch_in_flight(&self) -> watch::Receiver<usize> {
        self.in_flight.subscribe()
    }

    /// Validates `draft` and, if it passes, issues the create. Validation
    /// failures are reported as a warning and no call is made.
    pub fn create(&self, draft: &R::Draft) -> Result<MutationTicket, ValidationError> {
        self.validated(draft, FormMode::Create)?;
        Ok(self.issue(Mutation::Create(R::create_fields(draft))))
    }

    pub fn update(
        &self,
        id: &DocumentId,
        draft: &R::Draft,
    ) -> Result<MutationTicket, ValidationError> {
        self.validated(draft, FormMode::Edit)?;
        Ok(self.issue(Mutation::Update(id.clone(), R::update_fields(draft))))
    }

    pub fn delete(&self, id: &DocumentId) -> MutationTicket {
        self.issue(Mutation::Delete(id.clone()))
    }

    fn validated(&self, draft: &R::Draft, mode: FormMode) -> Result<(), ValidationError> {
        R::validate(draft, mode).inspect_err(|err| {
            self.notifier.notify(
                NotificationLevel::Warning,
                &R::COLLECTION,
                err.to_string(),
                None,
            );
        })
    }

    fn issue(&self, mutation: Mutation) -> MutationTicket {
        let token = Uuid::new_v4();
        let kind = mutation.kind();
        let target = mutation.target();
        let guard = InFlightGuard::enter(&self.in_flight);
        let store = Arc::clone(&self.store);
        let notifier = self.notifier.clone();
        let timeout = self.timeout;
        debug!(collection = %R::COLLECTION, %kind, %token, ?target, "mutation issued");

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let collection = R::COLLECTION;
            let outcome = match tokio::time::timeout(timeout, mutation.apply(&*store, &collection))
                .await
            {
                Ok(Ok(id)) => Ok(id),
                Ok(Err(source)) => Err(OperationError::Backend { kind, source }),
                Err(_) => Err(OperationError::TimedOut { kind, timeout }),
            };
            let messages = R::messages();
            match &outcome {
                Ok(_) => notifier.notify(
                    NotificationLevel::Success,
                    &collection,
                    messages.success(kind),
                    Some(token),
                ),
                Err(err) => {
                    warn!(%collection, %kind, %token, error = %err, "mutation failed");
                    notifier.notify(
                        NotificationLevel::Error,
                        &collection,
                        messages.failure(err),
                        Some(token),
                    );
                }
            }
            outcome
        });

        MutationTicket {
            token,
            kind,
            target,
            handle,
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
mod tests;
