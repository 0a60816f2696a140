//! The remote directory service.
//!
//! A remote store is reached through one stateful connection whose only notion
//! of location is its cursor. [`RemoteDirectoryService`] is the capability set
//! the rest of the crate needs from such a connection. Two implementations ship
//! with the crate: [`MemoryStore`], a self-contained tree used by tests, and
//! [`DirectoryStore`], which serves a local directory.

mod directory;
mod memory;

use bytes::Bytes;
use serde::Serialize;

use crate::error::Error;

pub use directory::DirectoryStore;
pub use memory::MemoryStore;

/// Classification of a listing record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One record of a remote listing. Never cached: the remote tree may change
/// between two calls, so every step that needs a listing fetches a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Modification time in unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<u32>,
}

impl DirectoryEntry {
    pub fn file<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size: None,
            modified: None,
        }
    }

    pub fn directory<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: None,
            modified: None,
        }
    }

    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }
}

/// Remote store connection. This is `async_trait`
///
/// Every method works relative to the cursor. Calls are strictly sequential;
/// `&mut self` everywhere keeps a second request from being issued while one
/// is in flight. Nothing here is assumed idempotent.
#[async_trait]
pub trait RemoteDirectoryService: Send {
    type Error: Into<Error> + Send;

    /// Lists `path`, or the cursor directory when `None`.
    async fn list(&mut self, path: Option<&str>) -> Result<Vec<DirectoryEntry>, Self::Error>;

    /// Fetches the contents of the file `name`.
    async fn get(&mut self, name: &str) -> Result<Bytes, Self::Error>;

    /// Stores `data` as `name`, replacing any existing file.
    async fn put(&mut self, data: Bytes, name: &str) -> Result<(), Self::Error>;

    /// Appends `data` to `name`, creating it when missing.
    async fn append(&mut self, data: Bytes, name: &str) -> Result<(), Self::Error>;

    async fn delete(&mut self, name: &str) -> Result<(), Self::Error>;

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error>;

    async fn mkdir(&mut self, name: &str) -> Result<(), Self::Error>;

    /// Removes the empty directory `name`.
    async fn rmdir(&mut self, name: &str) -> Result<(), Self::Error>;

    /// Moves the cursor into `name`.
    async fn cwd(&mut self, name: &str) -> Result<(), Self::Error>;

    /// Moves the cursor to its parent.
    async fn cdup(&mut self) -> Result<(), Self::Error>;

    /// Absolute path of the cursor.
    async fn pwd(&mut self) -> Result<String, Self::Error>;
}
