//! Candidate accumulation and source scanning.
//!
//! Candidates are class-like tokens harvested from editor content. The set
//! only grows during incremental builds; a full build replaces it.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;

use crate::storage::SourceFile;

/// Token boundaries: whitespace, quotes, markup and declaration punctuation.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[^ \t\r\n\x0C"'`<>{};=]+"#).expect("valid token pattern")
});

const MAX_CANDIDATE_LEN: usize = 96;

/// Ordered, duplicate-free set of candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet(BTreeSet<String>);

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, candidate: &str) -> bool {
        self.0.contains(candidate)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Add candidates, returning how many were new.
    pub fn extend<I, S>(&mut self, candidates: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.0.len();
        self.0.extend(candidates.into_iter().map(Into::into));
        self.0.len() - before
    }

    #[cfg(test)]
    pub fn is_superset(&self, other: &CandidateSet) -> bool {
        self.0.is_superset(&other.0)
    }
}

impl<S: Into<String>> FromIterator<S> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

fn is_candidate(token: &str) -> bool {
    (1..=MAX_CANDIDATE_LEN).contains(&token.len())
        && token.bytes().any(|b| b.is_ascii_alphabetic())
        && !token.contains("://")
        && !token.ends_with(':')
}

/// Extract candidates from a single text.
pub fn scan(text: &str) -> impl Iterator<Item = &str> {
    TOKEN
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|t| is_candidate(t))
}

/// Scan many sources in parallel.
pub fn scan_sources(sources: &[SourceFile]) -> CandidateSet {
    let found: Vec<BTreeSet<&str>> = sources
        .par_iter()
        .map(|source| scan(&source.content).collect())
        .collect();
    found.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_counts_new_only() {
        let mut set = CandidateSet::new();
        assert_eq!(set.extend(["flex", "p-4"]), 2);
        assert_eq!(set.extend(["flex", "grid"]), 1);
        assert_eq!(set.len(), 3);
        assert_eq!(set.iter().collect::<Vec<_>>(), ["flex", "grid", "p-4"]);
    }

    #[test]
    fn test_superset() {
        let mut set: CandidateSet = ["a", "b"].into_iter().collect();
        let before = set.clone();
        set.extend(["c"]);
        assert!(set.is_superset(&before));
        assert!(!before.is_superset(&set));
        assert!(CandidateSet::new().is_empty());
    }

    #[test]
    fn test_token_pattern_compiles() {
        LazyLock::force(&TOKEN);
    }

    #[test]
    fn test_scan_splits_on_any_whitespace() {
        let found: Vec<_> = scan("flex\tgrid\r\nmt-2\x0Cp-4 caf\u{e9}").collect();
        assert_eq!(found, ["flex", "grid", "mt-2", "p-4", "caf\u{e9}"]);
    }

    #[test]
    fn test_scan_markup() {
        let html = r#"<div class="flex p-4 hover:bg-red-500" data-x='1'>Hi https://x.io</div>"#;
        let found: Vec<_> = scan(html).collect();
        assert!(found.contains(&"flex"));
        assert!(found.contains(&"p-4"));
        assert!(found.contains(&"hover:bg-red-500"));
        assert!(!found.iter().any(|t| t.contains("://")));
        assert!(!found.contains(&"1"));
    }

    #[test]
    fn test_scan_rejects_labels_and_long_tokens() {
        let long = "a".repeat(MAX_CANDIDATE_LEN + 1);
        let text = format!("label: {long} ok");
        let found: Vec<_> = scan(&text).collect();
        assert_eq!(found, ["ok"]);
    }

    #[test]
    fn test_scan_sources_merges() {
        let sources = vec![
            SourceFile::new("a.html", "<p class=\"mt-2 flex\">"),
            SourceFile::new("b.html", "<p class=\"flex grid\">"),
        ];
        let set = scan_sources(&sources);
        assert!(set.contains("mt-2"));
        assert!(set.contains("grid"));
        assert_eq!(set.iter().filter(|c| *c == "flex").count(), 1);
    }
}
