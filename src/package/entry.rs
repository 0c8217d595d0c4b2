//! Package entries as they move through a conversion run.

use bytes::Bytes;

use crate::qti::classify::Classification;

/// An entry as read from an archive or folder, before classification.
#[derive(Debug, Clone)]
pub struct RawEntry {
    /// Package path, POSIX-style and relative to the package root
    pub path: String,
    pub data: Bytes,
}

impl RawEntry {
    pub fn new(path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
        }
    }
}

/// Content of a converted entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryContent {
    /// Decoded XML text
    Text(String),
    /// Anything passed through untouched
    Binary(Bytes),
}

impl EntryContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Size in bytes of the content as it will be written.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes to write out.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Text(text) => Bytes::copy_from_slice(text.as_bytes()),
            Self::Binary(data) => data.clone(),
        }
    }
}

/// One entry of the working set.
#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub path: String,
    pub content: EntryContent,
    pub classification: Classification,
}

impl PackageEntry {
    pub fn text(path: impl Into<String>, text: impl Into<String>, classification: Classification) -> Self {
        Self {
            path: path.into(),
            content: EntryContent::Text(text.into()),
            classification,
        }
    }

    pub fn binary(path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            content: EntryContent::Binary(data.into()),
            classification: Classification::Other,
        }
    }
}
