use std::fmt::Write as _;

use client_core::{
    records::numbered, Album, FormMode, ModalController, ModalState, Notification,
    NotificationLevel, SyncStatus, UserRow,
};

use crate::forms::FormView;

/// Page selection for the users table. `number` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub number: usize,
    pub size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { number: 1, size: 6 }
    }
}

impl Pagination {
    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.size.max(1)).max(1)
    }

    /// The requested page, pulled back onto the last page if the list shrank.
    pub fn current(&self, total: usize) -> usize {
        self.number.clamp(1, self.page_count(total))
    }

    pub fn slice<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        let size = self.size.max(1);
        let start = (self.current(rows.len()) - 1) * size;
        let end = (start + size).min(rows.len());
        &rows[start.min(rows.len())..end]
    }
}

pub fn render_sync(status: &SyncStatus) -> String {
    match status {
        SyncStatus::Connecting => "sync: connecting".into(),
        SyncStatus::Live => "sync: live".into(),
        SyncStatus::Lost {
            attempt,
            error,
            retry_in,
        } => format!(
            "sync: LOST ({error}); retry #{attempt} in {:.1}s, list may be stale",
            retry_in.as_secs_f64()
        ),
        SyncStatus::Stopped => "sync: stopped".into(),
    }
}

pub fn render_notification(notification: &Notification) -> String {
    let level = match notification.level {
        NotificationLevel::Success => "ok",
        NotificationLevel::Info => "info",
        NotificationLevel::Warning => "warn",
        NotificationLevel::Error => "error",
    };
    format!(
        "[{level}] {}: {}",
        notification.collection, notification.message
    )
}

pub fn render_albums(albums: &[Album], loading: bool) -> String {
    let mut out = String::from("== Albums ==\n");
    if loading {
        out.push_str("Loading...\n");
        return out;
    }
    if albums.is_empty() {
        out.push_str("(no albums)\n");
    }
    for (number, album) in numbered(albums) {
        let _ = write!(out, "{number:>3}. {}", album.name);
        if let Some(created_at) = album.created_at {
            let _ = write!(out, "  (added {})", created_at.format("%Y-%m-%d %H:%M"));
        }
        out.push('\n');
    }
    out
}

pub fn render_users(rows: &[UserRow<'_>], loading: bool, page: Pagination) -> String {
    let mut out = String::from("== Users ==\n");
    if loading {
        out.push_str("Loading...\n");
    }
    if rows.is_empty() {
        out.push_str("No users found\n");
        return out;
    }

    let visible = page.slice(rows);
    let name_width = visible
        .iter()
        .map(|row| row.user.name.chars().count())
        .chain(std::iter::once("Name".len()))
        .max()
        .unwrap_or(4);
    let _ = writeln!(out, "{:>4}  {:<name_width$}  Email", "No.", "Name");
    for row in visible {
        let _ = writeln!(
            out,
            "{:>4}  {:<name_width$}  {}",
            row.number, row.user.name, row.user.email
        );
    }
    let _ = writeln!(
        out,
        "page {} of {}, {} per page, {} users",
        page.current(rows.len()),
        page.page_count(rows.len()),
        page.size,
        rows.len()
    );
    out
}

pub fn render_modal<D: FormView + Default>(form: &ModalController<D>) -> Option<String> {
    let title = match form.state() {
        ModalState::Closed => return None,
        ModalState::Open(FormMode::Create) => D::CREATE_TITLE,
        ModalState::Open(FormMode::Edit) => D::EDIT_TITLE,
    };
    let mut out = format!("+-- {title} --\n");
    for name in D::FIELDS {
        let value = form.draft().field(name).unwrap_or_default();
        let shown = if D::is_secret(name) {
            "*".repeat(value.chars().count())
        } else {
            value.to_string()
        };
        let _ = writeln!(out, "| {name}: {shown}");
    }
    out.push_str("+-- set <field> <value>, submit, cancel\n");
    Some(out)
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;

