//! Compile error types.

use std::fmt;

use thiserror::Error;

use crate::vfs::{ResolutionError, VfsError};

/// Position of an error inside a source file (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub path: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    /// Compute line/column of a byte offset in `text`.
    pub fn at(path: &str, text: &str, offset: usize) -> Self {
        let before = &text[..offset.min(text.len())];
        let line = before.matches('\n').count() as u32 + 1;
        let column = before
            .rfind('\n')
            .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
            as u32
            + 1;
        Self {
            path: path.to_string(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.line, self.column)
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("{message}{}", .location.as_ref().map(|l| format!(" ({l})")).unwrap_or_default())]
    Syntax {
        message: String,
        location: Option<SourceLocation>,
    },

    #[error("import cycle through `{0}`")]
    ImportCycle(String),

    #[error("invalid design-system volume")]
    Volume(#[from] VfsError),
}

impl CompileError {
    pub fn syntax(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self::Syntax {
            message: message.into(),
            location,
        }
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Self::Syntax { location, .. } => location.as_ref(),
            _ => None,
        }
    }
}
