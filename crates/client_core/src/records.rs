//! Typed views over the `albums` and `users` collections.

use std::fmt::Debug;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use shared::domain::{CollectionName, Document, DocumentId, Fields};
use thiserror::Error;

use crate::{
    error::{MutationKind, OperationError, ValidationError},
    form::FormMode,
};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("document '{id}': field '{field}' is not a string")]
    NotAString { id: DocumentId, field: &'static str },
    #[error("document '{id}': field '{field}' is not a timestamp")]
    BadTimestamp { id: DocumentId, field: &'static str },
}

/// How a screen derives its loading indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingSemantics {
    /// Loading until the first snapshot arrives.
    UntilFirstSnapshot,
    /// Loading while any mutation is in flight.
    WhileMutating,
}

/// Notification texts for one screen.
#[derive(Debug)]
pub struct Messages {
    pub created: &'static str,
    pub updated: &'static str,
    pub deleted: &'static str,
    pub create_failed: &'static str,
    pub update_failed: &'static str,
    pub delete_failed: &'static str,
    /// Append the backend's error text to the failure message.
    pub append_cause: bool,
}

impl Messages {
    pub fn success(&self, kind: MutationKind) -> &'static str {
        match kind {
            MutationKind::Create => self.created,
            MutationKind::Update => self.updated,
            MutationKind::Delete => self.deleted,
        }
    }

    pub fn failure(&self, err: &OperationError) -> String {
        let prefix = match err.kind() {
            MutationKind::Create => self.create_failed,
            MutationKind::Update => self.update_failed,
            MutationKind::Delete => self.delete_failed,
        };
        if self.append_cause {
            format!("{prefix}{err}")
        } else {
            prefix.to_string()
        }
    }
}

/// A document type shown on one admin screen.
pub trait Record: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Mutable fields edited through the modal form.
    type Draft: Clone + Debug + Default + PartialEq + Send + Sync + 'static;

    const COLLECTION: CollectionName;
    const LOADING: LoadingSemantics;

    fn id(&self) -> &DocumentId;
    fn from_document(document: Document) -> Result<Self, DecodeError>;
    fn to_draft(&self) -> Self::Draft;
    fn validate(draft: &Self::Draft, mode: FormMode) -> Result<(), ValidationError>;
    fn create_fields(draft: &Self::Draft) -> Fields;
    fn update_fields(draft: &Self::Draft) -> Fields;
    fn messages() -> &'static Messages;
}

fn string_field(
    document: &Document,
    field: &'static str,
) -> Result<String, DecodeError> {
    match document.fields.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(DecodeError::NotAString {
            id: document.id.clone(),
            field,
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Album {
    pub id: DocumentId,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumDraft {
    pub name: String,
}

static ALBUM_MESSAGES: Messages = Messages {
    created: "Album added successfully!",
    updated: "Album updated successfully!",
    deleted: "Album deleted successfully!",
    create_failed: "Error adding album: ",
    update_failed: "Error updating album: ",
    delete_failed: "Error deleting album: ",
    append_cause: true,
};

impl Record for Album {
    type Draft = AlbumDraft;

    const COLLECTION: CollectionName = CollectionName::ALBUMS;
    const LOADING: LoadingSemantics = LoadingSemantics::UntilFirstSnapshot;

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn from_document(document: Document) -> Result<Self, DecodeError> {
        let name = string_field(&document, "name")?;
        let created_at = match document.fields.get("timestamp") {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|_| DecodeError::BadTimestamp {
                        id: document.id.clone(),
                        field: "timestamp",
                    })?
                    .with_timezone(&Utc),
            ),
            Some(_) => {
                return Err(DecodeError::BadTimestamp {
                    id: document.id.clone(),
                    field: "timestamp",
                })
            }
        };
        Ok(Self {
            id: document.id,
            name,
            created_at,
        })
    }

    fn to_draft(&self) -> AlbumDraft {
        AlbumDraft {
            name: self.name.clone(),
        }
    }

    fn validate(draft: &AlbumDraft, mode: FormMode) -> Result<(), ValidationError> {
        if is_blank(&draft.name) {
            return Err(match mode {
                FormMode::Create => ValidationError::MissingAlbumName,
                FormMode::Edit => ValidationError::EmptyAlbumName,
            });
        }
        Ok(())
    }

    fn create_fields(draft: &AlbumDraft) -> Fields {
        let mut fields = Self::update_fields(draft);
        fields.insert(
            "timestamp".into(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        fields
    }

    /// Only the name is editable; the creation timestamp is left alone.
    fn update_fields(draft: &AlbumDraft) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::String(draft.name.clone()));
        fields
    }

    fn messages() -> &'static Messages {
        &ALBUM_MESSAGES
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: DocumentId,
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    pub password: String,
}

static USER_MESSAGES: Messages = Messages {
    created: "User added successfully",
    updated: "User updated successfully",
    deleted: "User deleted successfully",
    create_failed: "Operation failed. Please try again.",
    update_failed: "Operation failed. Please try again.",
    delete_failed: "Failed to delete user. Please try again.",
    append_cause: false,
};

impl Record for User {
    type Draft = UserDraft;

    const COLLECTION: CollectionName = CollectionName::USERS;
    const LOADING: LoadingSemantics = LoadingSemantics::WhileMutating;

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn from_document(document: Document) -> Result<Self, DecodeError> {
        Ok(Self {
            name: string_field(&document, "name")?,
            email: string_field(&document, "email")?,
            password: string_field(&document, "password")?,
            id: document.id,
        })
    }

    fn to_draft(&self) -> UserDraft {
        UserDraft {
            name: self.name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }

    fn validate(draft: &UserDraft, _mode: FormMode) -> Result<(), ValidationError> {
        if is_blank(&draft.name) || is_blank(&draft.email) || is_blank(&draft.password) {
            return Err(ValidationError::MissingUserFields);
        }
        if !is_plausible_email(&draft.email) {
            return Err(ValidationError::InvalidEmail);
        }
        if draft.password.encode_utf16().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        Ok(())
    }

    fn create_fields(draft: &UserDraft) -> Fields {
        Self::update_fields(draft)
    }

    fn update_fields(draft: &UserDraft) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::String(draft.name.clone()));
        fields.insert("email".into(), Value::String(draft.email.clone()));
        fields.insert("password".into(), Value::String(draft.password.clone()));
        fields
    }

    fn messages() -> &'static Messages {
        &USER_MESSAGES
    }
}

/// Whitespace as browsers' form validation sees it: Unicode `White_Space`
/// without U+0085, plus the byte order mark U+FEFF.
fn is_form_space(c: char) -> bool {
    c == '\u{feff}' || (c != '\u{85}' && c.is_whitespace())
}

fn is_blank(value: &str) -> bool {
    value.chars().all(is_form_space)
}

/// `local@domain.tld`: no whitespace, exactly one `@`, non-empty local part,
/// and a domain with a dot that is neither its first nor last character.
pub fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(is_form_space) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// One row of the users table. The number is derived from snapshot order on
/// every read and is not an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow<'a> {
    pub number: usize,
    pub user: &'a User,
}

pub fn numbered<R>(records: &[R]) -> impl Iterator<Item = (usize, &R)> {
    records.iter().enumerate().map(|(index, record)| (index + 1, record))
}

pub fn user_rows(users: &[User]) -> Vec<UserRow<'_>> {
    numbered(users)
        .map(|(number, user)| UserRow { number, user })
        .collect()
}
