//! Entry attributes shared by the source and destination filesystems
//!
//! Both sides describe their files and directories with the same [`Entry`]
//! record. Identifiers are opaque: the source API hands out integers, the
//! destination may use anything, so [`EntryId`] stores the textual form and
//! accepts either representation on the wire.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::errors::DomainError;

// ============================================================================
// EntryId
// ============================================================================

/// Opaque identifier of an entry on either filesystem
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Create a new EntryId
    ///
    /// # Errors
    /// Returns error if the id is empty or contains whitespace
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::InvalidEntryId(
                "entry id cannot be empty".to_string(),
            ));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidEntryId(format!(
                "entry id contains whitespace: {id:?}"
            )));
        }
        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EntryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntryId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<u64> for EntryId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self::from(n)),
            Raw::Text(s) => Self::new(s).map_err(serde::de::Error::custom),
        }
    }
}

// ============================================================================
// EntryRef
// ============================================================================

/// Addresses an entry either by id or by path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryRef {
    Id(EntryId),
    Path(String),
}

impl EntryRef {
    /// Parses a user-supplied reference.
    ///
    /// Empty input and `/` address the filesystem root (`root_id`). An ASCII
    /// decimal that does not start with `0` is an id; anything else, including
    /// `"0123"`, is a path.
    pub fn parse(input: &str, root_id: &EntryId) -> Self {
        if input.trim_matches('/').is_empty() {
            return Self::Id(root_id.clone());
        }
        if input == root_id.as_str() {
            return Self::Id(root_id.clone());
        }
        if !input.starts_with('0') && !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit())
        {
            return Self::Id(EntryId(input.to_string()));
        }
        Self::Path(input.to_string())
    }

    /// Returns the id if this reference is one
    pub fn as_id(&self) -> Option<&EntryId> {
        match self {
            Self::Id(id) => Some(id),
            Self::Path(_) => None,
        }
    }
}

impl From<EntryId> for EntryRef {
    fn from(id: EntryId) -> Self {
        Self::Id(id)
    }
}

impl From<&EntryId> for EntryRef {
    fn from(id: &EntryId) -> Self {
        Self::Id(id.clone())
    }
}

impl Display for EntryRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Path(path) => write!(f, "path:{path}"),
        }
    }
}

// ============================================================================
// Entry
// ============================================================================

/// Attributes of a file or directory
///
/// The source API reports the content hash as `sha1`; the alias keeps that
/// payload deserializable without a separate DTO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Entry identifier
    pub id: EntryId,
    /// Identifier of the containing directory (absent for a filesystem root)
    #[serde(default)]
    pub parent_id: Option<EntryId>,
    /// File or directory name
    pub name: String,
    /// Full path, informational only
    #[serde(default)]
    pub path: String,
    /// Whether this entry is a directory
    pub is_directory: bool,
    /// Size in bytes (0 for directories)
    #[serde(default)]
    pub size: u64,
    /// Content hash, if the filesystem reports one
    #[serde(default, alias = "sha1")]
    pub hash: Option<String>,
    /// Download URL for file content
    #[serde(default)]
    pub url: Option<String>,
}

impl Entry {
    /// Builds a directory entry
    pub fn directory(id: EntryId, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id,
            parent_id: None,
            name: name.into(),
            path: path.into(),
            is_directory: true,
            size: 0,
            hash: None,
            url: None,
        }
    }

    /// Builds a file entry
    pub fn file(
        id: EntryId,
        name: impl Into<String>,
        path: impl Into<String>,
        size: u64,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            id,
            parent_id: None,
            name: name.into(),
            path: path.into(),
            is_directory: false,
            size,
            hash: Some(hash.into()),
            url: None,
        }
    }

    /// Sets the parent id
    pub fn with_parent(mut self, parent_id: EntryId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Sets the download URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Key used to match this entry inside one directory listing
    pub fn snapshot_key(&self) -> (String, bool) {
        (self.name.clone(), self.is_directory)
    }

    /// Whether the destination copy `other` already holds this file's content
    ///
    /// A missing hash on the source side never matches, so unhashed files are
    /// always transferred.
    pub fn content_matches(&self, other: &Entry) -> bool {
        match (&self.hash, &other.hash) {
            (Some(ours), Some(theirs)) => ours.eq_ignore_ascii_case(theirs),
            _ => false,
        }
    }

    /// Size counted toward the byte statistics (directories count as 0)
    pub fn accounted_size(&self) -> u64 {
        if self.is_directory {
            0
        } else {
            self.size
        }
    }
}
