//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Find config file by searching upward from current directory.
///
/// ```text
/// /home/user/site/templates/bricks/   ← cwd
/// /home/user/site/windsync.toml       ← found!
/// ```
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_from(&cwd, config_name)
}

fn find_from(start: &Path, config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}
