use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field map of a stored document, keyed by field name.
pub type Fields = serde_json::Map<String, serde_json::Value>;

const MAX_COLLECTION_NAME_LEN: usize = 64;

/// Backend-assigned identifier of a document within one collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionNameError {
    #[error("collection name must not be empty")]
    Empty,
    #[error("collection name exceeds {MAX_COLLECTION_NAME_LEN} bytes")]
    TooLong,
    #[error("collection name may only contain ASCII letters, digits, '-' and '_': {0:?}")]
    InvalidCharacter(String),
}

/// Name of a collection in the document store.
///
/// Restricted to `[A-Za-z0-9_-]{1,64}` so it can be embedded in URL paths
/// without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(Cow<'static, str>);

impl CollectionName {
    pub const ALBUMS: CollectionName = CollectionName::from_static("albums");
    pub const USERS: CollectionName = CollectionName::from_static("users");

    /// Compile-time checked constructor; an invalid literal fails const evaluation.
    pub const fn from_static(name: &'static str) -> Self {
        assert!(is_valid_collection_name(name), "invalid collection name");
        Self(Cow::Borrowed(name))
    }

    pub fn parse(name: &str) -> Result<Self, CollectionNameError> {
        if name.is_empty() {
            return Err(CollectionNameError::Empty);
        }
        if name.len() > MAX_COLLECTION_NAME_LEN {
            return Err(CollectionNameError::TooLong);
        }
        if !is_valid_collection_name(name) {
            return Err(CollectionNameError::InvalidCharacter(name.to_string()));
        }
        Ok(Self(Cow::Owned(name.to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

const fn is_valid_collection_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_COLLECTION_NAME_LEN {
        return false;
    }
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if !(b.is_ascii_alphanumeric() || b == b'_' || b == b'-') {
            return false;
        }
        i += 1;
    }
    true
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CollectionName {
    type Error = CollectionNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CollectionName> for String {
    fn from(value: CollectionName) -> Self {
        value.0.into_owned()
    }
}

/// One document as delivered in a snapshot: identifier plus its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(serde_json::Value::as_str)
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
