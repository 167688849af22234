//! Storage collaborator: persists generated cache files and enumerates
//! content sources.
//!
//! The orchestrator only ever talks to the [`Storage`] trait; the CLI wires in
//! [`FsStorage`], tests use an in-memory store.

mod fs;
#[cfg(test)]
mod memory;

pub use fs::{FsStorage, read_tree};
#[cfg(test)]
pub use memory::MemoryStorage;

use std::path::PathBuf;

use thiserror::Error;

/// A named text source (template file, design-system file, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// What to enumerate with [`Storage::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Design-system files, named by virtual path (`/main.css`).
    Volume,
    /// Content sources owned by one builder.
    Provider(String),
    /// Content sources of every known builder.
    All,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error at `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("path `{0}` escapes the storage root")]
    OutsideRoot(String),

    #[error("unknown content provider `{0}`")]
    UnknownProvider(String),
}

pub trait Storage: Send + Sync {
    /// Persist `content` at a path relative to the storage root.
    fn save(&self, relative_path: &str, content: &str) -> Result<(), StorageError>;

    /// Enumerate sources matching `selector`.
    fn list(&self, selector: &Selector) -> Result<Vec<SourceFile>, StorageError>;

    /// Read back a previously saved file, `None` if it does not exist.
    fn read(&self, relative_path: &str) -> Result<Option<String>, StorageError>;
}
