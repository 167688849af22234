//! Design-token (custom property) extraction for the variable-sync stylesheet.

use std::sync::LazyLock;

use regex::Regex;

static ROOT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":(?:root|host)(?:[^A-Za-z0-9_{-][^{]*)?\{([^}]*)\}")
        .expect("valid root-block pattern")
});

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(--[A-Za-z0-9_-]+)[ \t\r\n]*:[ \t\r\n]*([^;]+?)[ \t\r\n]*(?:;|$)")
        .expect("valid declaration pattern")
});

/// Collect `--name: value` pairs from `:root`/`:host` blocks.
///
/// A redefined variable keeps its first position and takes the last value.
pub fn extract_variables(css: &str) -> Vec<(String, String)> {
    let mut vars: Vec<(String, String)> = Vec::new();
    for block in ROOT_BLOCK.captures_iter(css) {
        for decl in DECLARATION.captures_iter(&block[1]) {
            let (name, value) = (&decl[1], &decl[2]);
            match vars.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => vars.push((name.to_string(), value.to_string())),
            }
        }
    }
    vars
}

pub fn render_variables(vars: &[(String, String)]) -> String {
    if vars.is_empty() {
        return String::new();
    }
    let mut out = String::from(":root {\n");
    for (name, value) in vars {
        out.push_str(&format!("  {name}: {value};\n"));
    }
    out.push_str("}\n");
    out
}
