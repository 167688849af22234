//! Encode a design-system directory into a volume blob.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::storage::{SourceFile, read_tree};
use crate::vfs::VfsSnapshot;

/// Files are mounted at `/<path relative to dir>`.
pub fn pack_dir(dir: &Path) -> Result<String> {
    if !dir.is_dir() {
        bail!("`{}` is not a directory", dir.display());
    }
    let files = read_tree(dir)?
        .into_iter()
        .map(|f| SourceFile::new(format!("/{}", f.name), f.content))
        .collect();
    let snapshot = VfsSnapshot::from_sources(files)
        .with_context(|| format!("cannot pack {}", dir.display()))?;
    crate::debug!("pack"; "{} files", snapshot.len());
    Ok(snapshot.encode())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_pack_mounts_at_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("parts")).unwrap();
        fs::write(dir.path().join("main.css"), "@import './parts/a.css';").unwrap();
        fs::write(dir.path().join("parts/a.css"), ".a{}").unwrap();

        let blob = pack_dir(dir.path()).unwrap();
        let snapshot = VfsSnapshot::decode(&blob).unwrap();
        assert_eq!(snapshot.get("/main.css"), Some("@import './parts/a.css';"));
        assert_eq!(snapshot.get("/parts/a.css"), Some(".a{}"));
    }

    #[test]
    fn test_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(pack_dir(&dir.path().join("nope")).is_err());
    }
}
