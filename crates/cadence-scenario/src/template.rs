//! `{name}` placeholder syntax
//!
//! Names are identifiers optionally followed by dotted path segments
//! (`{user.name}`, `{items.0}`). Anything else inside braces is plain text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches one `{name}` / `{a.b.0}` placeholder, capturing the path
pub static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_\-]*(?:\.[A-Za-z0-9_\-]+)*)\}")
        .expect("placeholder pattern is valid")
});

static PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*(?:\.[A-Za-z0-9_\-]+)*$").expect("path pattern is valid")
});

/// Iterate placeholder paths in `text`, in order of appearance
pub fn placeholders(text: &str) -> impl Iterator<Item = &str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
}

/// Check if `text` contains at least one placeholder
#[inline]
#[must_use]
pub fn has_placeholder(text: &str) -> bool {
    PLACEHOLDER.is_match(text)
}

/// If `text` is exactly one placeholder, return its path
#[must_use]
pub fn single_placeholder(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('{')?.strip_suffix('}')?;
    is_path(inner).then_some(inner)
}

/// Check if `text` is a valid variable path (`name`, `a.b`, `items.0`)
#[inline]
#[must_use]
pub fn is_path(text: &str) -> bool {
    PATH.is_match(text)
}
