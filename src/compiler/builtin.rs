//! Built-in design-system engine.
//!
//! Understands a small utility-first dialect on top of plain CSS:
//!
//! ```css
//! @import "./theme.css";          /* inlined in order, each file once */
//! @theme { --color-brand: #0af; } /* collected into one :root rule */
//! @utility brand { color: var(--color-brand); }  /* emitted only if used */
//! .card { padding: 1rem; }        /* passed through verbatim */
//! ```
//!
//! Remote imports (`http://`, `https://`, `//`) are left untouched.

use std::fmt::Write;
use std::ops::Range;

use rustc_hash::FxHashSet;

use super::engine::{CompilerEngine, DesignSystem, ImportHook};
use super::{CompileError, SourceLocation};

pub struct BuiltinEngine;

impl CompilerEngine for BuiltinEngine {
    fn compile(
        &self,
        css: &str,
        base: &str,
        hook: &dyn ImportHook,
    ) -> Result<Box<dyn DesignSystem>, CompileError> {
        let mut inliner = Inliner {
            hook,
            seen: FxHashSet::default(),
            stack: Vec::new(),
        };
        let source = inliner.inline(css, base)?;
        Ok(Box::new(Sheet::parse(&source, base)?))
    }
}

// =============================================================================
// Import inlining
// =============================================================================

struct Inliner<'h> {
    hook: &'h dyn ImportHook,
    /// Files already inlined somewhere
    seen: FxHashSet<String>,
    /// Current import chain
    stack: Vec<String>,
}

impl Inliner<'_> {
    fn inline(&mut self, css: &str, path: &str) -> Result<String, CompileError> {
        self.seen.insert(path.to_string());
        self.stack.push(path.to_string());

        let rules = at_rules(css, path)?;
        let mut out = String::with_capacity(css.len());
        let mut cursor = 0;

        for rule in &rules {
            match rule.name {
                "utility" => validate_utility(rule, css, path)?,
                "import" => {
                    let target = import_target(rule.prelude).ok_or_else(|| {
                        CompileError::syntax(
                            "malformed @import",
                            Some(SourceLocation::at(path, css, rule.span.start)),
                        )
                    })?;
                    if is_remote(target) {
                        continue;
                    }

                    let resolved = self.hook.load(target, path)?;
                    if self.stack.contains(&resolved.path) {
                        return Err(CompileError::ImportCycle(resolved.path));
                    }

                    out.push_str(&css[cursor..rule.span.start]);
                    cursor = rule.span.end;

                    if self.seen.contains(&resolved.path) {
                        continue;
                    }
                    let nested = self.inline(&resolved.content, &resolved.path)?;
                    out.push_str(&nested);
                }
                _ => {}
            }
        }

        out.push_str(&css[cursor..]);
        self.stack.pop();
        Ok(out)
    }
}

fn validate_utility(rule: &AtRule<'_>, css: &str, path: &str) -> Result<(), CompileError> {
    let name = rule.prelude.trim();
    let valid = rule.body.is_some()
        && name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | '.'));
    if valid {
        return Ok(());
    }
    Err(CompileError::syntax(
        format!("invalid utility `{name}`"),
        Some(SourceLocation::at(path, css, rule.span.start)),
    ))
}

/// Target of an `@import` prelude: `"x"`, `'x'` or `url(x)`.
fn import_target(prelude: &str) -> Option<&str> {
    let prelude = prelude.trim();
    if let Some(rest) = prelude.strip_prefix("url(") {
        let inner = rest[..rest.find(')')?].trim();
        return Some(inner.trim_matches(|c| c == '"' || c == '\''));
    }
    let quote = prelude.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let rest = &prelude[1..];
    Some(&rest[..rest.find(quote)?])
}

fn is_remote(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://") || target.starts_with("//")
}

// =============================================================================
// Compiled sheet
// =============================================================================

struct Sheet {
    theme: Vec<(String, String)>,
    utilities: Vec<(String, String)>,
    /// Everything that is neither theme nor utility
    rest: String,
}

impl Sheet {
    fn parse(source: &str, path: &str) -> Result<Self, CompileError> {
        let mut theme = Vec::new();
        let mut utilities = Vec::new();
        let mut rest = String::with_capacity(source.len());
        let mut cursor = 0;

        for rule in at_rules(source, path)? {
            match (rule.name, rule.body) {
                ("theme", Some(body)) => {
                    for (name, value) in declarations(body) {
                        if name.starts_with("--") {
                            upsert(&mut theme, name, value);
                        }
                    }
                }
                ("utility", Some(body)) => upsert(&mut utilities, rule.prelude.trim(), body.trim()),
                _ => continue,
            }
            rest.push_str(&source[cursor..rule.span.start]);
            cursor = rule.span.end;
        }
        rest.push_str(&source[cursor..]);

        Ok(Self {
            theme,
            utilities,
            rest,
        })
    }
}

impl DesignSystem for Sheet {
    fn build(&self, candidates: &[&str]) -> String {
        let wanted: FxHashSet<&str> = candidates.iter().copied().collect();
        let mut out = String::new();

        if !self.theme.is_empty() {
            out.push_str(":root{");
            for (name, value) in &self.theme {
                let _ = write!(out, "{name}:{value};");
            }
            out.push_str("}\n");
        }

        out.push_str(&self.rest);

        for (name, body) in &self.utilities {
            if !wanted.contains(name.as_str()) {
                continue;
            }
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            let _ = write!(out, ".{}{{{}}}", escape_class(name), body);
        }
        out
    }
}

/// Insert or replace while keeping first-declaration order.
fn upsert(list: &mut Vec<(String, String)>, name: &str, value: &str) {
    match list.iter_mut().find(|(n, _)| n == name) {
        Some(entry) => entry.1 = value.to_string(),
        None => list.push((name.to_string(), value.to_string())),
    }
}

/// Split a declaration block on `;` outside parentheses.
fn declarations(body: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in body.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                out.extend(declaration(&body[start..idx]));
                start = idx + 1;
            }
            _ => {}
        }
    }
    out.extend(declaration(&body[start..]));
    out
}

fn declaration(text: &str) -> Option<(&str, &str)> {
    let (name, value) = text.split_once(':')?;
    let (name, value) = (name.trim(), value.trim());
    (!name.is_empty() && !value.is_empty()).then_some((name, value))
}

/// Escape a class name for use in a selector.
fn escape_class(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (idx, c) in name.chars().enumerate() {
        match c {
            '0'..='9' if idx == 0 => {
                let _ = write!(out, "\\{:x} ", c as u32);
            }
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

// =============================================================================
// Top-level at-rule scanner
// =============================================================================

/// A top-level at-rule and the byte span it occupies.
struct AtRule<'a> {
    name: &'a str,
    prelude: &'a str,
    body: Option<&'a str>,
    span: Range<usize>,
}

struct Pending<'a> {
    start: usize,
    name: &'a str,
    name_end: usize,
    body_start: Option<usize>,
}

/// Find top-level at-rules, checking brace balance on the way.
///
/// Comments and strings are skipped. `@import` statements also end at a
/// newline so a missing `;` does not swallow the next rule.
fn at_rules<'a>(text: &'a str, path: &str) -> Result<Vec<AtRule<'a>>, CompileError> {
    let bytes = text.as_bytes();
    let mut rules = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut pending: Option<Pending<'a>> = None;
    let mut i = 0;

    let statement = move |p: &Pending<'a>, end: usize, span_end: usize| AtRule {
        name: p.name,
        prelude: &text[p.name_end..end],
        body: None,
        span: p.start..span_end,
    };

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = text[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |end| i + 2 + end + 2);
                continue;
            }
            quote @ (b'"' | b'\'') => {
                i = skip_string(bytes, i, quote);
                continue;
            }
            b'{' => {
                if open.is_empty()
                    && let Some(p) = pending.as_mut()
                {
                    p.body_start = Some(i + 1);
                }
                open.push(i);
            }
            b'}' => {
                if open.pop().is_none() {
                    return Err(CompileError::syntax(
                        "unexpected `}`",
                        Some(SourceLocation::at(path, text, i)),
                    ));
                }
                if open.is_empty()
                    && let Some(p) = pending.take()
                    && let Some(body_start) = p.body_start
                {
                    rules.push(AtRule {
                        name: p.name,
                        prelude: &text[p.name_end..body_start - 1],
                        body: Some(&text[body_start..i]),
                        span: p.start..i + 1,
                    });
                }
            }
            b';' if open.is_empty() => {
                if let Some(p) = pending.take() {
                    rules.push(statement(&p, i, i + 1));
                }
            }
            b'\n' if open.is_empty() => {
                if let Some(p) = pending.take_if(|p| p.name == "import") {
                    rules.push(statement(&p, i, i));
                }
            }
            b'@' if open.is_empty() && pending.is_none() => {
                let name_end = i
                    + 1
                    + bytes[i + 1..]
                        .iter()
                        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'-' || **b == b'_')
                        .count();
                pending = Some(Pending {
                    start: i,
                    name: &text[i + 1..name_end],
                    name_end,
                    body_start: None,
                });
                i = name_end;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    if let Some(&pos) = open.last() {
        return Err(CompileError::syntax(
            "unclosed `{`",
            Some(SourceLocation::at(path, text, pos)),
        ));
    }
    if let Some(p) = pending {
        rules.push(statement(&p, text.len(), text.len()));
    }
    Ok(rules)
}

/// Index just past the string starting at `start` (ends at quote or newline).
fn skip_string(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}
