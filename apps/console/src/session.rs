//! Screen switching and command handling for one console session.

use std::sync::Arc;

use client_core::{
    records::Record, Album, AlbumsScreen, ClientSettings, CollectionScreen, DocumentStore,
    ListState, Notifier, SubmitError, User, UsersScreen,
};
use shared::domain::DocumentId;
use tokio::sync::watch;
use tracing::debug;

use crate::{
    command::{Command, Target, HELP},
    forms::FormView,
    render::{render_albums, render_modal, render_sync, render_users, Pagination},
};

enum ActiveScreen {
    Albums {
        screen: AlbumsScreen,
        changes: watch::Receiver<ListState<Album>>,
    },
    Users {
        screen: UsersScreen,
        changes: watch::Receiver<ListState<User>>,
        in_flight: watch::Receiver<usize>,
    },
}

/// What the caller should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Print(String),
    Render,
    Nothing,
    Quit,
}

pub struct Session {
    store: Arc<dyn DocumentStore>,
    notifier: Notifier,
    settings: ClientSettings,
    active: ActiveScreen,
    page: Pagination,
}

impl Session {
    /// Opens the albums screen. Must be called within a tokio runtime.
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Notifier, settings: ClientSettings) -> Self {
        let active = open_albums(&store, &notifier, &settings);
        Self {
            store,
            notifier,
            settings,
            active,
            page: Pagination::default(),
        }
    }

    pub fn handle(&mut self, command: Command) -> Reply {
        match command {
            Command::Quit => Reply::Quit,
            Command::Help => Reply::Print(HELP.into()),
            Command::Albums => {
                if !matches!(self.active, ActiveScreen::Albums { .. }) {
                    self.switch(open_albums(&self.store, &self.notifier, &self.settings));
                }
                Reply::Render
            }
            Command::Users => {
                if !matches!(self.active, ActiveScreen::Users { .. }) {
                    self.switch(open_users(&self.store, &self.notifier, &self.settings));
                }
                Reply::Render
            }
            Command::Status => Reply::Print(self.status_line()),
            Command::Resync => {
                match &self.active {
                    ActiveScreen::Albums { screen, .. } => screen.live().resubscribe(),
                    ActiveScreen::Users { screen, .. } => screen.live().resubscribe(),
                }
                Reply::Nothing
            }
            Command::Page(number) => match &self.active {
                ActiveScreen::Users { screen, .. } => {
                    let pages = self.page.page_count(screen.records().len());
                    if number > pages {
                        Reply::Print(format!("there are only {pages} page(s)"))
                    } else {
                        self.page.number = number;
                        Reply::Render
                    }
                }
                ActiveScreen::Albums { .. } => {
                    Reply::Print("pagination applies to the users table".into())
                }
            },
            Command::PageSize(size) => {
                self.page = Pagination { number: 1, size };
                Reply::Render
            }
            command => match &mut self.active {
                ActiveScreen::Albums { screen, .. } => form_command(screen, command),
                ActiveScreen::Users { screen, .. } => form_command(screen, command),
            },
        }
    }

    /// Resolves when the active screen has something new to show: a new list
    /// state or, on the users screen, a change in pending mutations.
    pub async fn changed(&mut self) {
        let alive = match &mut self.active {
            ActiveScreen::Albums { changes, .. } => changes.changed().await.is_ok(),
            ActiveScreen::Users {
                changes, in_flight, ..
            } => tokio::select! {
                changed = changes.changed() => changed.is_ok(),
                changed = in_flight.changed() => changed.is_ok(),
            },
        };
        if !alive {
            std::future::pending::<()>().await;
        }
    }

    pub fn render(&self) -> String {
        let mut out = match &self.active {
            ActiveScreen::Albums { screen, .. } => {
                let mut out = render_albums(&screen.records(), screen.loading());
                if let Some(modal) = render_modal(screen.form()) {
                    out.push_str(&modal);
                }
                out
            }
            ActiveScreen::Users { screen, .. } => {
                let users = screen.records();
                let mut out =
                    render_users(&UsersScreen::rows(&users), screen.loading(), self.page);
                if let Some(modal) = render_modal(screen.form()) {
                    out.push_str(&modal);
                }
                out
            }
        };
        out.push_str(&self.status_line());
        out
    }

    fn status_line(&self) -> String {
        let (status, pending) = match &self.active {
            ActiveScreen::Albums { screen, .. } => {
                (screen.sync_status(), screen.dispatcher().in_flight())
            }
            ActiveScreen::Users { screen, .. } => {
                (screen.sync_status(), screen.dispatcher().in_flight())
            }
        };
        format!("{}, {pending} pending", render_sync(&status))
    }

    fn switch(&mut self, next: ActiveScreen) {
        let previous = std::mem::replace(&mut self.active, next);
        close(previous);
        self.page.number = 1;
    }

    pub fn close(&mut self) {
        match &mut self.active {
            ActiveScreen::Albums { screen, .. } => screen.close(),
            ActiveScreen::Users { screen, .. } => screen.close(),
        }
    }
}

fn close(active: ActiveScreen) {
    match active {
        ActiveScreen::Albums { mut screen, .. } => screen.close(),
        ActiveScreen::Users { mut screen, .. } => screen.close(),
    }
}

fn open_albums(
    store: &Arc<dyn DocumentStore>,
    notifier: &Notifier,
    settings: &ClientSettings,
) -> ActiveScreen {
    debug!("switching to albums");
    let screen = AlbumsScreen::open(Arc::clone(store), notifier.clone(), settings);
    let changes = screen.live().watch();
    ActiveScreen::Albums { screen, changes }
}

fn open_users(
    store: &Arc<dyn DocumentStore>,
    notifier: &Notifier,
    settings: &ClientSettings,
) -> ActiveScreen {
    debug!("switching to users");
    let screen = UsersScreen::open(Arc::clone(store), notifier.clone(), settings);
    let changes = screen.live().watch();
    let in_flight = screen.dispatcher().watch_in_flight();
    ActiveScreen::Users {
        screen,
        changes,
        in_flight,
    }
}

fn resolve<R: Record>(records: &[R], target: &Target) -> Option<DocumentId> {
    match target {
        Target::Row(number) => number
            .checked_sub(1)
            .and_then(|index| records.get(index))
            .map(|record| record.id().clone()),
        Target::Id(id) => records
            .iter()
            .find(|record| record.id() == id)
            .map(|record| record.id().clone()),
    }
}

fn describe(target: &Target) -> String {
    match target {
        Target::Row(number) => format!("row {number}"),
        Target::Id(id) => format!("id {id}"),
    }
}

fn form_command<R>(screen: &mut CollectionScreen<R>, command: Command) -> Reply
where
    R: Record,
    R::Draft: FormView,
{
    match command {
        Command::Add => {
            if screen.begin_create() {
                Reply::Render
            } else {
                Reply::Print("a form is already open; submit or cancel it first".into())
            }
        }
        Command::Edit(target) => {
            let Some(id) = resolve(&screen.records(), &target) else {
                return Reply::Print(format!("no record at {}", describe(&target)));
            };
            if screen.begin_edit(&id) {
                Reply::Render
            } else {
                Reply::Print("a form is already open; submit or cancel it first".into())
            }
        }
        Command::Set { field, value } => {
            let Some(draft) = screen.draft_mut() else {
                return Reply::Print("no form is open; use 'add' or 'edit' first".into());
            };
            match draft.field_mut(&field) {
                Some(slot) => {
                    *slot = value;
                    Reply::Render
                }
                None => Reply::Print(format!(
                    "unknown field '{field}', expected one of: {}",
                    <R::Draft as FormView>::FIELDS.join(", ")
                )),
            }
        }
        Command::Submit => match screen.submit() {
            // The outcome arrives as a notification.
            Ok(_ticket) => Reply::Render,
            Err(err @ (SubmitError::ModalClosed | SubmitError::Busy)) => Reply::Print(err.to_string()),
            // Already reported as a warning notification.
            Err(SubmitError::Invalid(_)) => Reply::Nothing,
        },
        Command::Cancel => {
            screen.cancel();
            Reply::Render
        }
        Command::Delete(target) => match resolve(&screen.records(), &target) {
            Some(id) => {
                screen.delete(&id);
                Reply::Nothing
            }
            None => Reply::Print(format!("no record at {}", describe(&target))),
        },
        other => Reply::Print(format!("'{other:?}' is not available here")),
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
