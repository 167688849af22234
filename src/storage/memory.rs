use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{Selector, SourceFile, Storage, StorageError};

/// In-memory storage recording every write.
#[derive(Default)]
pub struct MemoryStorage {
    volume: Mutex<Vec<SourceFile>>,
    providers: Mutex<BTreeMap<String, Vec<SourceFile>>>,
    files: Mutex<BTreeMap<String, String>>,
    writes: Mutex<Vec<(String, String)>>,
    sources_unreadable: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume(self, files: &[(&str, &str)]) -> Self {
        *self.volume.lock() = files
            .iter()
            .map(|(name, content)| SourceFile::new(*name, *content))
            .collect();
        self
    }

    pub fn add_source(&self, provider: &str, name: &str, content: &str) {
        self.providers
            .lock()
            .entry(provider.to_string())
            .or_default()
            .push(SourceFile::new(name, content));
    }

    /// Replace every source of `provider`.
    pub fn set_sources(&self, provider: &str, files: &[(&str, &str)]) {
        self.providers.lock().insert(
            provider.to_string(),
            files
                .iter()
                .map(|(name, content)| SourceFile::new(*name, *content))
                .collect(),
        );
    }

    pub fn set_volume_file(&self, name: &str, content: &str) {
        let mut volume = self.volume.lock();
        volume.retain(|f| f.name != name);
        volume.push(SourceFile::new(name, content));
    }

    /// Place a file without recording it as a write.
    pub fn put(&self, path: &str, content: &str) {
        self.files.lock().insert(path.to_string(), content.to_string());
    }

    /// Make every content listing fail with an IO error.
    pub fn set_sources_unreadable(&self, unreadable: bool) {
        self.sources_unreadable.store(unreadable, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().clone()
    }
}

impl Storage for MemoryStorage {
    fn save(&self, relative_path: &str, content: &str) -> Result<(), StorageError> {
        self.put(relative_path, content);
        self.writes
            .lock()
            .push((relative_path.to_string(), content.to_string()));
        Ok(())
    }

    fn list(&self, selector: &Selector) -> Result<Vec<SourceFile>, StorageError> {
        if *selector != Selector::Volume && self.sources_unreadable.load(Ordering::SeqCst) {
            return Err(StorageError::Io(
                PathBuf::from("sources"),
                io::Error::other("device unavailable"),
            ));
        }
        match selector {
            Selector::Volume => Ok(self.volume.lock().clone()),
            Selector::Provider(id) => self
                .providers
                .lock()
                .get(id)
                .cloned()
                .ok_or_else(|| StorageError::UnknownProvider(id.clone())),
            Selector::All => Ok(self.providers.lock().values().flatten().cloned().collect()),
        }
    }

    fn read(&self, relative_path: &str) -> Result<Option<String>, StorageError> {
        Ok(self.files.lock().get(relative_path).cloned())
    }
}
