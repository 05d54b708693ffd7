use std::sync::Arc;

use shared::domain::DocumentId;
use tracing::debug;

use crate::{
    config::ClientSettings,
    dispatch::{MutationDispatcher, MutationTicket},
    error::SubmitError,
    form::{CloseReason, FormMode, ModalController, ModalState},
    notify::Notifier,
    records::{user_rows, Album, LoadingSemantics, Record, User, UserRow},
    sync::{LiveCollection, SyncStatus},
    DocumentStore,
};

/// One admin screen: a live list, its mutation dispatcher and the modal form.
pub struct CollectionScreen<R: Record> {
    live: LiveCollection<R>,
    dispatcher: MutationDispatcher<R>,
    form: ModalController<R::Draft>,
}

pub type AlbumsScreen = CollectionScreen<Album>;
pub type UsersScreen = CollectionScreen<User>;

impl<R: Record> CollectionScreen<R> {
    /// Starts the subscription. Must be called within a tokio runtime.
    pub fn open(store: Arc<dyn DocumentStore>, notifier: Notifier, settings: &ClientSettings) -> Self {
        debug!(collection = %R::COLLECTION, "opening screen");
        Self {
            live: LiveCollection::start(
                Arc::clone(&store),
                notifier.clone(),
                settings.reconnect.clone(),
            ),
            dispatcher: MutationDispatcher::new(store, notifier, settings.mutation_timeout),
            form: ModalController::new(),
        }
    }

    /// Ends the subscription and discards any open form. Mutations already
    /// issued still complete and notify.
    pub fn close(&mut self) {
        self.form.close(CloseReason::Dismissed);
        self.live.stop();
    }

    pub fn records(&self) -> Vec<R> {
        self.live.records()
    }

    pub fn loading(&self) -> bool {
        match R::LOADING {
            LoadingSemantics::UntilFirstSnapshot => !self.live.is_loaded(),
            LoadingSemantics::WhileMutating => self.dispatcher.in_flight() > 0,
        }
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.live.status()
    }

    pub fn live(&self) -> &LiveCollection<R> {
        &self.live
    }

    pub fn dispatcher(&self) -> &MutationDispatcher<R> {
        &self.dispatcher
    }

    pub fn form(&self) -> &ModalController<R::Draft> {
        &self.form
    }

    pub fn modal(&self) -> ModalState {
        self.form.state()
    }

    pub fn begin_create(&mut self) -> bool {
        self.form.open_create()
    }

    /// Opens the edit form pre-filled from the record as currently listed.
    /// Returns `false` if the record is not listed or a form is already open.
    pub fn begin_edit(&mut self, id: &DocumentId) -> bool {
        if self.form.is_open() {
            return false;
        }
        let draft = self
            .live
            .state()
            .records
            .iter()
            .find(|record| record.id() == id)
            .map(Record::to_draft);
        match draft {
            Some(draft) => self.form.open_edit(id.clone(), draft),
            None => false,
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut R::Draft> {
        self.form.draft_mut()
    }

    pub fn cancel(&mut self) {
        self.form.close(CloseReason::Cancelled);
    }

    pub fn dismiss(&mut self) {
        self.form.close(CloseReason::Dismissed);
    }

    /// Validates and issues the form's mutation, closing the form without
    /// waiting for the backend. On a validation failure the form stays open
    /// with its draft intact.
    pub fn submit(&mut self) -> Result<MutationTicket, SubmitError> {
        if !self.form.is_open() {
            return Err(SubmitError::ModalClosed);
        }
        if R::LOADING == LoadingSemantics::WhileMutating && self.loading() {
            return Err(SubmitError::Busy);
        }
        let ticket = match (self.form.state(), self.form.editing_id()) {
            (ModalState::Open(FormMode::Create), _) => self.dispatcher.create(self.form.draft())?,
            (ModalState::Open(FormMode::Edit), Some(id)) => {
                self.dispatcher.update(id, self.form.draft())?
            }
            _ => return Err(SubmitError::ModalClosed),
        };
        self.form.close(CloseReason::Submitted);
        Ok(ticket)
    }

    pub fn delete(&self, id: &DocumentId) -> MutationTicket {
        self.dispatcher.delete(id)
    }
}

impl CollectionScreen<User> {
    /// Current users with their 1-based row numbers.
    pub fn rows(users: &[User]) -> Vec<UserRow<'_>> {
        user_rows(users)
    }
}

#[cfg(test)]
#[path = "tests/screen_tests.rs"]
mod tests;
