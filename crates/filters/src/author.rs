//! Heuristic author-name matching
//!
//! Catalog sources disagree on author form: "Knuth, Donald E." in one,
//! "Knuth D." in another. The heuristic here accepts names that agree on
//! the surname and whose given-name tokens are compatible under initial
//! abbreviation.

use crate::text_normalization::normalize;

/// Compare two author names with surname + initials tolerance
///
/// Both names are normalized first. Names match when:
/// - the leading (surname) tokens are equal, and
/// - each given-name token of the shorter name is a prefix of the
///   positionally corresponding token of the longer name.
///
/// A name with no given-name tokens matches on surname alone. Empty
/// input on either side never matches.
pub fn author_match(a: &str, b: &str) -> bool {
    let a = normalize(a);
    let b = normalize(b);

    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }

    let a_tokens: Vec<&str> = a.split(' ').collect();
    let b_tokens: Vec<&str> = b.split(' ').collect();

    // Leading token is the surname in bibliographic name order
    if a_tokens[0] != b_tokens[0] {
        return false;
    }

    let (short, long) = if a_tokens.len() <= b_tokens.len() {
        (&a_tokens, &b_tokens)
    } else {
        (&b_tokens, &a_tokens)
    };

    short
        .iter()
        .zip(long.iter())
        .skip(1)
        .all(|(s, l)| l.starts_with(s) || s.starts_with(l))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_names() {
        assert!(author_match("Knuth, Donald", "Knuth, Donald"));
    }

    #[test]
    fn test_initial_abbreviation() {
        assert!(author_match("Knuth D.", "Knuth, Donald"));
        assert!(author_match("Knuth, Donald E.", "Knuth, D. E."));
    }

    #[test]
    fn test_surname_only() {
        assert!(author_match("Knuth", "Knuth, Donald"));
    }

    #[test]
    fn test_different_surnames() {
        assert!(!author_match("Knuth, Donald", "Dijkstra, Edsger"));
    }

    #[test]
    fn test_conflicting_given_names() {
        assert!(!author_match("Knuth, Donald", "Knuth, Peter"));
    }

    #[test]
    fn test_empty_sides() {
        assert!(!author_match("", "Knuth"));
        assert!(!author_match("Knuth", ""));
        assert!(!author_match("", ""));
    }

    #[test]
    fn test_diacritic_insensitive() {
        assert!(author_match("Dvořák, Antonín", "Dvorak, Antonin"));
    }
}
