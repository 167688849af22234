//! Virtual file system for in-memory compilation.
//!
//! A [`VfsSnapshot`] stands in for a disk: the compiler resolves the
//! design-system entrypoint and every `@import` against it. Snapshots travel
//! between contexts as an opaque blob (`encode` / `decode`), and each build
//! decodes a fresh one.
//!
//! # Module Structure
//!
//! - `path` - POSIX path normalization
//! - `resolve` - Module resolution (snapshot first, package fallback second)

mod path;
mod resolve;

pub use path::{join, normalize};
use path::ancestors;
pub use resolve::{ModuleLoader, ModuleResolver, PackageLoader, ResolutionError, Resolved};

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::SourceFile;

/// Encoding format version written into every blob.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("invalid virtual path `{0}` (must be absolute)")]
    InvalidPath(String),

    #[error("virtual path `{0}` escapes the root")]
    EscapesRoot(String),

    #[error("`{file}` is a file but `{child}` uses it as a directory")]
    FileAsDirectory { file: String, child: String },

    #[error("duplicate entry `{0}`")]
    Duplicate(String),

    #[error("unsupported snapshot format version {0}")]
    Version(u32),

    #[error("malformed snapshot blob")]
    Encoding(#[from] base64::DecodeError),

    #[error("malformed snapshot payload")]
    Payload(#[from] serde_json::Error),
}

/// Immutable-once-built mapping of virtual path to text content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VfsSnapshot {
    entries: BTreeMap<String, String>,
}

/// Wire shape of an encoded snapshot.
#[derive(Serialize, Deserialize)]
struct Encoded {
    version: u32,
    files: Vec<EncodedEntry>,
}

#[derive(Serialize, Deserialize)]
struct EncodedEntry {
    path: String,
    content: String,
}

impl VfsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from entries, rejecting duplicates.
    pub fn from_entries<P, C>(entries: impl IntoIterator<Item = (P, C)>) -> Result<Self, VfsError>
    where
        P: AsRef<str>,
        C: Into<String>,
    {
        let mut snapshot = Self::new();
        for (path, content) in entries {
            let path = normalize(path.as_ref())?;
            if snapshot.entries.contains_key(&path) {
                return Err(VfsError::Duplicate(path));
            }
            snapshot.insert(&path, content)?;
        }
        Ok(snapshot)
    }

    /// Build a snapshot from storage source files (names are virtual paths).
    pub fn from_sources(files: Vec<SourceFile>) -> Result<Self, VfsError> {
        Self::from_entries(files.into_iter().map(|f| (f.name, f.content)))
    }

    /// Insert or replace an entry.
    ///
    /// Fails if the path would turn an existing file into a directory or
    /// shadow existing entries below it.
    pub fn insert(&mut self, path: &str, content: impl Into<String>) -> Result<(), VfsError> {
        let path = normalize(path)?;

        if let Some(file) = ancestors(&path).find(|dir| self.entries.contains_key(*dir)) {
            return Err(VfsError::FileAsDirectory {
                file: file.to_string(),
                child: path.clone(),
            });
        }

        let prefix = format!("{path}/");
        if let Some((child, _)) = self.entries.range(prefix.clone()..).next()
            && child.starts_with(&prefix)
        {
            return Err(VfsError::FileAsDirectory {
                file: path.clone(),
                child: child.clone(),
            });
        }

        self.entries.insert(path, content.into());
        Ok(())
    }

    /// Exact lookup by normalized path.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    /// Serialize into an opaque transport blob.
    pub fn encode(&self) -> String {
        let encoded = Encoded {
            version: FORMAT_VERSION,
            files: self
                .entries
                .iter()
                .map(|(path, content)| EncodedEntry {
                    path: path.clone(),
                    content: content.clone(),
                })
                .collect(),
        };
        // Serializing strings into JSON cannot fail.
        let json = serde_json::to_vec(&encoded).unwrap_or_default();
        STANDARD.encode(json)
    }

    /// Reconstruct a snapshot from a blob produced by [`VfsSnapshot::encode`].
    pub fn decode(blob: &str) -> Result<Self, VfsError> {
        let bytes = STANDARD.decode(blob.trim())?;
        let encoded: Encoded = serde_json::from_slice(&bytes)?;
        if encoded.version != FORMAT_VERSION {
            return Err(VfsError::Version(encoded.version));
        }
        Self::from_entries(encoded.files.into_iter().map(|e| (e.path, e.content)))
    }
}
