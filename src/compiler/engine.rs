//! Compiler engine interface.
//!
//! The facade never parses CSS itself: an engine turns the entrypoint source
//! into a [`DesignSystem`], pulling imports through an [`ImportHook`], and the
//! design system materializes utilities for a candidate list.

use super::CompileError;
use crate::vfs::{ModuleResolver, ResolutionError, Resolved};

/// Import hook handed to the engine (the module resolver).
pub trait ImportHook {
    fn load(&self, module: &str, base: &str) -> Result<Resolved, ResolutionError>;
}

impl ImportHook for ModuleResolver<'_> {
    fn load(&self, module: &str, base: &str) -> Result<Resolved, ResolutionError> {
        self.resolve(module, base)
    }
}

pub trait CompilerEngine: Send + Sync {
    /// Compile root source located at virtual path `base`.
    fn compile(
        &self,
        css: &str,
        base: &str,
        hook: &dyn ImportHook,
    ) -> Result<Box<dyn DesignSystem>, CompileError>;
}

/// A compiled design system, ready to materialize utilities.
pub trait DesignSystem {
    /// Generate CSS for `candidates`. Must be deterministic.
    fn build(&self, candidates: &[&str]) -> String;
}
