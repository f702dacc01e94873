//! Canonical file/folder object
//!
//! [`RemoteObject`] is the uniform representation every driver operation
//! returns to the host, whatever shape the remote JSON had.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file or folder on the remote drive
///
/// Objects are never mutated after construction; the `with_*` methods
/// return an updated copy. Folders always report a size of 0. The parent
/// is implied by the listing context and is not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    id: String,
    name: String,
    size: u64,
    modified: DateTime<Utc>,
    is_folder: bool,
}

impl RemoteObject {
    /// Creates a file object
    pub fn file(
        id: impl Into<String>,
        name: impl Into<String>,
        size: u64,
        modified: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size,
            modified,
            is_folder: false,
        }
    }

    /// Creates a folder object (size is always 0)
    pub fn folder(id: impl Into<String>, name: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size: 0,
            modified,
            is_folder: true,
        }
    }

    /// Remote identifier; empty when the remote did not report one
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    pub fn is_folder(&self) -> bool {
        self.is_folder
    }

    /// Value of the `type` form field the remote expects for this object
    pub fn type_tag(&self) -> &'static str {
        if self.is_folder {
            "folder"
        } else {
            "file"
        }
    }

    /// Returns a copy with a different name
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Returns a copy with a different modification time
    #[must_use]
    pub fn with_modified(&self, modified: DateTime<Utc>) -> Self {
        Self {
            modified,
            ..self.clone()
        }
    }
}
