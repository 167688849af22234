//! Filesystem-backed storage rooted at the project directory.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use jwalk::WalkDir;

use super::{Selector, SourceFile, Storage, StorageError};

pub struct FsStorage {
    root: PathBuf,
    /// Directory holding the design-system files
    volume: PathBuf,
    /// Provider id → source directories
    providers: BTreeMap<String, Vec<PathBuf>>,
}

impl FsStorage {
    pub fn new(
        root: impl Into<PathBuf>,
        volume: impl AsRef<Path>,
        providers: BTreeMap<String, Vec<PathBuf>>,
    ) -> Self {
        let root = root.into();
        let volume = root.join(volume);
        let providers = providers
            .into_iter()
            .map(|(id, dirs)| (id, dirs.into_iter().map(|d| root.join(d)).collect()))
            .collect();
        Self {
            root,
            volume,
            providers,
        }
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(relative_path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe || relative_path.is_empty() {
            return Err(StorageError::OutsideRoot(relative_path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Provider sources, named relative to the project root.
    fn provider_sources(&self, dirs: &[PathBuf]) -> Result<Vec<SourceFile>, StorageError> {
        let mut files = Vec::new();
        for dir in dirs {
            for file in read_tree(dir)? {
                let name = relative_name(&self.root, &dir.join(&file.name));
                files.push(SourceFile::new(name, file.content));
            }
        }
        Ok(files)
    }
}

impl Storage for FsStorage {
    fn save(&self, relative_path: &str, content: &str) -> Result<(), StorageError> {
        let path = self.resolve(relative_path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io(parent.into(), e))?;
        }
        // Write-then-rename so readers never observe a half-written cache
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, content).map_err(|e| StorageError::Io(tmp.clone(), e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StorageError::Io(path.clone(), e))
    }

    fn list(&self, selector: &Selector) -> Result<Vec<SourceFile>, StorageError> {
        match selector {
            Selector::Volume => Ok(read_tree(&self.volume)?
                .into_iter()
                .map(|f| SourceFile::new(format!("/{}", f.name), f.content))
                .collect()),
            Selector::Provider(id) => {
                let dirs = self
                    .providers
                    .get(id)
                    .ok_or_else(|| StorageError::UnknownProvider(id.clone()))?;
                self.provider_sources(dirs)
            }
            Selector::All => {
                let mut files = Vec::new();
                for dirs in self.providers.values() {
                    files.extend(self.provider_sources(dirs)?);
                }
                Ok(files)
            }
        }
    }

    fn read(&self, relative_path: &str) -> Result<Option<String>, StorageError> {
        let path = self.resolve(relative_path)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(path, e)),
        }
    }
}

/// Read every text file below `dir`, named by `/`-separated relative path.
///
/// Missing directories yield no files; non-UTF-8 files are skipped.
pub fn read_tree(dir: &Path) -> Result<Vec<SourceFile>, StorageError> {
    if !dir.exists() {
        crate::debug!("storage"; "skipping missing directory {}", dir.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort(true) {
        let entry = entry.map_err(|e| {
            StorageError::Io(dir.to_path_buf(), std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        match std::fs::read_to_string(&path) {
            Ok(content) => files.push(SourceFile::new(relative_name(dir, &path), content)),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                crate::debug!("storage"; "skipping binary file {}", path.display());
            }
            Err(e) => return Err(StorageError::Io(path, e)),
        }
    }
    Ok(files)
}

fn relative_name(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
