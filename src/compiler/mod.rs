//! Design-system compilation.
//!
//! [`Compiler::build`] turns a volume, an entrypoint and the observed
//! candidates into raw CSS; [`optimize`] post-processes it for the editors.

mod builtin;
mod candidates;
mod engine;
mod error;
mod optimize;
mod variables;

use std::borrow::Cow;
use std::sync::Arc;

pub use builtin::BuiltinEngine;
pub use candidates::{CandidateSet, scan_sources};
pub use engine::{CompilerEngine, DesignSystem};
pub use error::{CompileError, SourceLocation};
pub use optimize::optimize;
pub use variables::{extract_variables, render_variables};

use crate::debug;
use crate::vfs::{ModuleLoader, ModuleResolver, VfsSnapshot};

/// Design-system files for one build, decoded or still in transit.
#[derive(Debug, Clone, Copy)]
pub enum Volume<'a> {
    Snapshot(&'a VfsSnapshot),
    Encoded(&'a str),
}

impl<'a> Volume<'a> {
    fn snapshot(self) -> Result<Cow<'a, VfsSnapshot>, CompileError> {
        Ok(match self {
            Self::Snapshot(snapshot) => Cow::Borrowed(snapshot),
            Self::Encoded(blob) => Cow::Owned(VfsSnapshot::decode(blob)?),
        })
    }
}

impl<'a> From<&'a VfsSnapshot> for Volume<'a> {
    fn from(snapshot: &'a VfsSnapshot) -> Self {
        Self::Snapshot(snapshot)
    }
}

pub struct BuildInput<'a> {
    pub candidates: &'a CandidateSet,
    /// Entrypoint module, resolved like any import from `/`.
    pub entrypoint: &'a str,
    pub volume: Volume<'a>,
}

/// Facade over a [`CompilerEngine`].
#[derive(Clone)]
pub struct Compiler {
    engine: Arc<dyn CompilerEngine>,
    packages: Option<Arc<dyn ModuleLoader>>,
}

impl Compiler {
    pub fn new(engine: Arc<dyn CompilerEngine>) -> Self {
        Self {
            engine,
            packages: None,
        }
    }

    /// Loader for modules the volume does not carry.
    pub fn with_packages(mut self, packages: Arc<dyn ModuleLoader>) -> Self {
        self.packages = Some(packages);
        self
    }

    /// Compile the design system and materialize `candidates`.
    ///
    /// Every resolution failure aborts the build.
    pub fn build(&self, input: BuildInput<'_>) -> Result<String, CompileError> {
        let volume = input.volume.snapshot()?;
        let resolver = ModuleResolver::new(&volume).with_fallback(self.packages.as_deref());

        let entry = resolver.resolve(input.entrypoint, "/")?;
        debug!("compile"; "entry {} ({} files, {} candidates)", entry.path, volume.len(), input.candidates.len());

        let system = self.engine.compile(&entry.content, &entry.path, &resolver)?;
        let candidates: Vec<&str> = input.candidates.iter().collect();
        Ok(system.build(&candidates))
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(Arc::new(BuiltinEngine))
    }
}
