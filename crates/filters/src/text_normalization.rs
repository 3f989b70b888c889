//! Text normalization for candidate keys and fuzzy comparison
//!
//! Bibliographic metadata arrives in wildly inconsistent encodings and
//! punctuation conventions, so every comparison in the engine runs on the
//! normalized form produced here.

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Maximum length of a derived title key, in characters
pub const TITLE_KEY_MAX_CHARS: usize = 200;

// Lazy-initialized regexes shared by all callers
static PUNCTUATION_REGEX: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_REGEX: OnceLock<Regex> = OnceLock::new();

fn punctuation_regex() -> &'static Regex {
    PUNCTUATION_REGEX
        .get_or_init(|| Regex::new(r"[^\w\s]").expect("Failed to compile punctuation regex"))
}

fn whitespace_regex() -> &'static Regex {
    WHITESPACE_REGEX.get_or_init(|| Regex::new(r"\s+").expect("Failed to compile whitespace regex"))
}

/// Normalize a metadata string for comparison
///
/// Applies transformations in the following order:
/// 1. Unicode NFKD decomposition with combining marks stripped
/// 2. Lowercase conversion
/// 3. Punctuation replaced with spaces
/// 4. Whitespace runs collapsed, ends trimmed
pub fn normalize(text: &str) -> String {
    let decomposed: String = text.nfkd().filter(|c| !is_combining_mark(*c)).collect();

    let lowered = decomposed.to_lowercase();
    let no_punct = punctuation_regex().replace_all(&lowered, " ");
    whitespace_regex()
        .replace_all(&no_punct, " ")
        .trim()
        .to_string()
}

/// Derive the candidate-generation key for a title
///
/// The key is the normalized title with spaces removed, truncated to
/// [`TITLE_KEY_MAX_CHARS`]. Returns an empty string when the title
/// normalizes to nothing, in which case no key should be stored.
pub fn create_title_key(title: &str) -> String {
    let normalized = normalize(title);
    normalized
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(TITLE_KEY_MAX_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_case_and_punctuation() {
        assert_eq!(normalize("Hello, WORLD!!!"), "hello world");
    }

    #[test]
    fn test_normalize_diacritics() {
        assert_eq!(normalize("Café Bühne"), "cafe buhne");
        assert_eq!(normalize("Dvořák"), "dvorak");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize("  too   many\tspaces \n"), "too many spaces");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  ...  "), "");
    }

    #[test]
    fn test_title_key_strips_spaces() {
        assert_eq!(
            create_title_key("The Art of Computer Programming"),
            "theartofcomputerprogramming"
        );
    }

    #[test]
    fn test_title_key_empty_title() {
        assert_eq!(create_title_key("???"), "");
    }

    #[test]
    fn test_title_key_truncation() {
        let long_title = "word ".repeat(100);
        let key = create_title_key(&long_title);
        assert_eq!(key.chars().count(), TITLE_KEY_MAX_CHARS);
    }

    #[test]
    fn test_title_key_stable() {
        let a = create_title_key("Sibelius: Finlandia, Op. 26");
        let b = create_title_key("sibelius finlandia op 26");
        assert_eq!(a, b);
    }
}
