//! Modal form state shared by the create and edit flows.

use shared::domain::DocumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalState {
    Closed,
    Open(FormMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Cancelled,
    Submitted,
    /// Closed from outside the form (overlay click, escape, screen teardown).
    Dismissed,
}

/// Owns the draft buffer and which record, if any, is being edited.
///
/// `editing_id` is `Some` exactly when the modal is open in edit mode, and
/// closing the modal always restores the empty draft.
#[derive(Debug, Clone, Default)]
pub struct ModalController<D> {
    mode: Option<FormMode>,
    editing_id: Option<DocumentId>,
    draft: D,
}

impl<D: Default> ModalController<D> {
    pub fn new() -> Self {
        Self {
            mode: None,
            editing_id: None,
            draft: D::default(),
        }
    }

    pub fn state(&self) -> ModalState {
        match self.mode {
            None => ModalState::Closed,
            Some(mode) => ModalState::Open(mode),
        }
    }

    pub fn is_open(&self) -> bool {
        self.mode.is_some()
    }

    /// Returns `false` and leaves the state untouched if the modal is already open.
    pub fn open_create(&mut self) -> bool {
        if self.is_open() {
            return false;
        }
        self.mode = Some(FormMode::Create);
        self.editing_id = None;
        self.draft = D::default();
        true
    }

    /// Opens in edit mode with a copy of the record's current values.
    pub fn open_edit(&mut self, id: DocumentId, draft: D) -> bool {
        if self.is_open() {
            return false;
        }
        self.mode = Some(FormMode::Edit);
        self.editing_id = Some(id);
        self.draft = draft;
        true
    }

    /// Closes from any state. Closing an already closed modal is a no-op reset.
    pub fn close(&mut self, reason: CloseReason) -> ModalState {
        let previous = self.state();
        tracing::trace!(?previous, ?reason, "closing form");
        self.mode = None;
        self.editing_id = None;
        self.draft = D::default();
        previous
    }

    pub fn draft(&self) -> &D {
        &self.draft
    }

    /// `None` while closed; edits only land in an open form.
    pub fn draft_mut(&mut self) -> Option<&mut D> {
        if self.is_open() {
            Some(&mut self.draft)
        } else {
            None
        }
    }

    pub fn editing_id(&self) -> Option<&DocumentId> {
        self.editing_id.as_ref()
    }
}
