//! Module resolution against a snapshot with a package fallback.
//!
//! Resolution order:
//! 1. exact path in the snapshot
//! 2. path relative to the importing file's directory, in the snapshot
//! 3. the fallback [`ModuleLoader`] (installed packages the VFS does not virtualize)
//!
//! A miss at every step is [`ResolutionError::NotFound`], never empty content.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use super::{VfsSnapshot, join, normalize};

/// Virtual directory under which package files are addressed.
pub const PACKAGE_ROOT: &str = "/node_modules/";

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("cannot resolve `{module}` from `{base}`")]
    NotFound { module: String, base: String },

    #[error("failed to read package module `{module}`")]
    Package {
        module: String,
        #[source]
        source: std::io::Error,
    },
}

/// A resolved module: its virtual path (base for nested imports) and source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: String,
    pub content: String,
}

/// Loader for modules that live outside the snapshot.
pub trait ModuleLoader: Send + Sync {
    /// Load a package specifier such as `tailwindcss` or `pkg/theme.css`.
    ///
    /// `Ok(None)` means the loader does not know the module.
    fn load(&self, specifier: &str) -> Result<Option<Resolved>, ResolutionError>;
}

/// Resolves import specifiers for one compile.
pub struct ModuleResolver<'a> {
    snapshot: &'a VfsSnapshot,
    fallback: Option<&'a dyn ModuleLoader>,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(snapshot: &'a VfsSnapshot) -> Self {
        Self {
            snapshot,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Option<&'a dyn ModuleLoader>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Resolve `module` as imported from the file at `base`.
    pub fn resolve(&self, module: &str, base: &str) -> Result<Resolved, ResolutionError> {
        let not_found = || ResolutionError::NotFound {
            module: module.to_string(),
            base: base.to_string(),
        };

        // 1. exact path
        if let Some(content) = self.snapshot.get(module) {
            return Ok(Resolved {
                path: module.to_string(),
                content: content.to_string(),
            });
        }
        if module.starts_with('/')
            && let Ok(path) = normalize(module)
            && let Some(content) = self.snapshot.get(&path)
        {
            return Ok(Resolved {
                path,
                content: content.to_string(),
            });
        }

        // 2. relative to the importing file
        let joined = if module.starts_with('/') {
            None
        } else {
            join(base, module).ok()
        };
        if let Some(path) = &joined
            && let Some(content) = self.snapshot.get(path)
        {
            return Ok(Resolved {
                path: path.clone(),
                content: content.to_string(),
            });
        }

        // 3. package fallback
        let Some(fallback) = self.fallback else {
            return Err(not_found());
        };
        let specifier = match &joined {
            // Relative import from inside a package file
            Some(path) if path.starts_with(PACKAGE_ROOT) => &path[PACKAGE_ROOT.len()..],
            _ if is_bare(module) => module,
            _ => return Err(not_found()),
        };
        fallback.load(specifier)?.ok_or_else(not_found)
    }
}

/// Bare specifiers name packages (`tailwindcss`, `@scope/pkg/x.css`).
fn is_bare(module: &str) -> bool {
    !module.is_empty() && !module.starts_with('.') && !module.starts_with('/')
}

// ============================================================================
// Package loader
// ============================================================================

/// Loads packages from an installed package directory (`node_modules` layout).
///
/// - `pkg` resolves to `package.json`'s `style` field, else `index.css`
/// - `pkg/sub/path.css` resolves to that file (`.css` appended if missing)
pub struct PackageLoader {
    root: PathBuf,
}

impl PackageLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, specifier: &str, relative: &Path) -> Result<Option<Resolved>, ResolutionError> {
        let file = self.root.join(relative);
        match std::fs::read_to_string(&file) {
            Ok(content) => Ok(Some(Resolved {
                path: format!("{PACKAGE_ROOT}{}", to_posix(relative)),
                content,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ResolutionError::Package {
                module: specifier.to_string(),
                source,
            }),
        }
    }

    /// Entry stylesheet of a package directory.
    fn entry(&self, package: &str) -> String {
        let manifest = self.root.join(package).join("package.json");
        std::fs::read_to_string(manifest)
            .ok()
            .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
            .and_then(|json| json.get("style")?.as_str().map(str::to_string))
            .unwrap_or_else(|| "index.css".to_string())
    }
}

impl ModuleLoader for PackageLoader {
    fn load(&self, specifier: &str) -> Result<Option<Resolved>, ResolutionError> {
        let relative = Path::new(specifier);
        // Packages may only address files below the package root
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Ok(None);
        }

        let (package, subpath) = split_package(specifier);
        let relative = match subpath {
            None => Path::new(package).join(self.entry(package)),
            Some(sub) => Path::new(package).join(sub),
        };

        if let Some(found) = self.read(specifier, &relative)? {
            return Ok(Some(found));
        }
        if relative.extension().is_none() {
            return self.read(specifier, &relative.with_extension("css"));
        }
        Ok(None)
    }
}

/// Split `@scope/pkg/sub.css` into (`@scope/pkg`, `sub.css`).
fn split_package(specifier: &str) -> (&str, Option<&str>) {
    let name_parts = if specifier.starts_with('@') { 2 } else { 1 };
    let mut split_at = None;
    for (seen, (idx, _)) in specifier.match_indices('/').enumerate() {
        if seen + 1 == name_parts {
            split_at = Some(idx);
            break;
        }
    }
    match split_at {
        Some(idx) => (&specifier[..idx], Some(&specifier[idx + 1..])),
        None => (specifier, None),
    }
}

fn to_posix(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
