//! Stylesheet optimization via lightningcss.
//!
//! Uses a fixed browser profile chosen for the supported editors: nesting is
//! always lowered, logical properties are never rewritten.

use std::sync::{Arc, RwLock};

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Features, Targets};

use super::{CompileError, SourceLocation};

/// Filename reported in optimizer diagnostics.
const FILENAME: &str = "generated.css";

/// Optimized stylesheet with recoverable parse warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Optimized {
    pub css: String,
    pub warnings: Vec<String>,
}

/// Encode a browser version the way lightningcss expects.
const fn version(major: u32, minor: u32) -> u32 {
    (major << 16) | (minor << 8)
}

fn targets() -> Targets {
    Targets {
        browsers: Some(Browsers {
            chrome: Some(version(111, 0)),
            edge: Some(version(111, 0)),
            firefox: Some(version(128, 0)),
            safari: Some(version(16, 4)),
            ios_saf: Some(version(16, 4)),
            ..Browsers::default()
        }),
        include: Features::Nesting,
        exclude: Features::LogicalProperties,
    }
}

/// Optimize (and optionally minify) generated CSS.
pub fn optimize(css: &str, minify: bool) -> Result<Optimized, CompileError> {
    let collected = Arc::new(RwLock::new(Vec::new()));
    let options = ParserOptions {
        filename: FILENAME.to_string(),
        error_recovery: true,
        warnings: Some(Arc::clone(&collected)),
        ..ParserOptions::default()
    };

    let mut sheet = StyleSheet::parse(css, options).map_err(|e| {
        CompileError::syntax(e.kind.to_string(), e.loc.map(|loc| location(loc.line, loc.column)))
    })?;

    let targets = targets();
    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| CompileError::syntax(e.kind.to_string(), None))?;

    let output = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| CompileError::syntax(e.kind.to_string(), None))?;

    let warnings = collected
        .read()
        .map(|list| list.iter().map(|w| w.to_string()).collect())
        .unwrap_or_default();

    Ok(Optimized {
        css: output.code,
        warnings,
    })
}

/// lightningcss lines are 0-based, columns 1-based.
fn location(line: u32, column: u32) -> SourceLocation {
    SourceLocation {
        path: FILENAME.to_string(),
        line: line + 1,
        column,
    }
}
