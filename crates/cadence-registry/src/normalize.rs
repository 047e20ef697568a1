//! Identifier normalization
//!
//! Action references arrive from scenario authors and upstream planners with
//! quoting artifacts (`` `code_generator`. ``, `"send_message"`), mixed case
//! and inconsistent separators. These helpers are total: any input string
//! produces some output, possibly empty.

/// Characters stripped from both ends of a reference
const ARTIFACT_CHARS: &[char] = &[
    '`', '"', '\'', '.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '<', '>', '*',
    '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}',
];

/// Strip surrounding whitespace and quoting/punctuation artifacts
///
/// Interior characters are left untouched.
#[must_use]
pub fn strip_artifacts(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || ARTIFACT_CHARS.contains(&c))
}

/// Strip artifacts, collapse interior whitespace and lower-case
#[must_use]
pub fn clean_reference(raw: &str) -> String {
    strip_artifacts(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Map `-`, `.`, `/` and whitespace runs to a single `_`
#[must_use]
pub fn fold_separators(cleaned: &str) -> String {
    let mut out = String::with_capacity(cleaned.len());
    let mut pending = false;
    for c in cleaned.chars() {
        if c == '-' || c == '.' || c == '/' || c == '_' || c.is_whitespace() {
            pending = true;
            continue;
        }
        if pending && !out.is_empty() {
            out.push('_');
        }
        pending = false;
        out.push(c);
    }
    out
}

/// Split a free-text string into lower-case alphanumeric tokens
#[must_use]
pub fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strip_backticks_and_trailing_dot() {
        assert_eq!(strip_artifacts("`code_generator`."), "code_generator");
        assert_eq!(clean_reference("`code_generator`."), "code_generator");
    }

    #[test]
    fn clean_lowercases_and_collapses() {
        assert_eq!(clean_reference("  \"Live   Server\" "), "live server");
        assert_eq!(clean_reference("Send_Message"), "send_message");
    }

    #[test]
    fn clean_keeps_interior_punctuation() {
        assert_eq!(clean_reference("web.fetch"), "web.fetch");
    }

    #[test]
    fn fold_separator_variants() {
        assert_eq!(fold_separators("send-message"), "send_message");
        assert_eq!(fold_separators("send message"), "send_message");
        assert_eq!(fold_separators("web.fetch"), "web_fetch");
        assert_eq!(fold_separators("--a--b--"), "a_b");
        assert_eq!(fold_separators("already_folded"), "already_folded");
    }

    #[test]
    fn tokens_split_on_non_alphanumeric() {
        assert_eq!(tokens("Fetch the URL, then Save!"), vec!["fetch", "the", "url", "then", "save"]);
        assert!(tokens("--").is_empty());
    }

    proptest! {
        #[test]
        fn prop_clean_is_idempotent(raw in ".{0,40}") {
            let once = clean_reference(&raw);
            let twice = clean_reference(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_fold_never_has_double_underscore(raw in "[a-z _.-]{0,40}") {
            let folded = fold_separators(&raw);
            prop_assert!(!folded.contains("__"));
            prop_assert!(!folded.starts_with('_'));
            prop_assert!(!folded.ends_with('_'));
        }
    }
}
