//! `<name>` placeholders in runbook commands.
//!
//! A placeholder is `<` followed by one or more of `[A-Za-z0-9_-]` and `>`.
//! Bindings are keyed by the full token, angle brackets included.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Placeholder token (e.g. `<file>`) to bound value.
pub type Bindings = BTreeMap<String, String>;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[A-Za-z0-9_-]+>").expect("placeholder regex is valid"));

/// Extract placeholder tokens in order of first appearance, without duplicates.
pub fn extract(text: &str) -> Vec<String> {
    let mut params: Vec<String> = Vec::new();
    for m in PLACEHOLDER.find_iter(text) {
        if !params.iter().any(|p| p == m.as_str()) {
            params.push(m.as_str().to_string());
        }
    }
    params
}

/// Replace every occurrence of each bound token with its value.
///
/// Unbound tokens stay in the output verbatim. Substitution is a single pass,
/// so a value that itself looks like a placeholder is never expanded again.
pub fn substitute(text: &str, bindings: &Bindings) -> String {
    if bindings.is_empty() {
        return text.to_string();
    }
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match bindings.get(&caps[0]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
