//! Sortable keys for record identifiers
//!
//! Component parts of the same host must iterate in the same order on
//! every source, even when the sources store them differently. Sorting by
//! a digit-padded key makes "rec2" sort before "rec10", which plain
//! lexicographic order would not.

/// Width digit runs are padded to inside a sort key
const DIGIT_RUN_WIDTH: usize = 12;

/// Derive a sort key from a record id
///
/// Every run of ASCII digits is zero-padded to a fixed width so numeric
/// id suffixes compare numerically; all other characters pass through
/// unchanged. The result is only meaningful as a comparison key.
pub fn create_id_sort_key(id: &str) -> String {
    let mut key = String::with_capacity(id.len() + DIGIT_RUN_WIDTH);
    let mut digits = String::new();

    for c in id.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            if !digits.is_empty() {
                pad_digits(&mut key, &digits);
                digits.clear();
            }
            key.push(c);
        }
    }
    if !digits.is_empty() {
        pad_digits(&mut key, &digits);
    }

    key
}

fn pad_digits(key: &mut String, digits: &str) {
    let trimmed = digits.trim_start_matches('0');
    let effective = if trimmed.is_empty() { "0" } else { trimmed };
    for _ in effective.len()..DIGIT_RUN_WIDTH {
        key.push('0');
    }
    key.push_str(effective);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_suffix_order() {
        let mut ids = vec!["rec10", "rec2", "rec1"];
        ids.sort_by_key(|id| create_id_sort_key(id));
        assert_eq!(ids, vec!["rec1", "rec2", "rec10"]);
    }

    #[test]
    fn test_leading_zeros_equalized() {
        assert_eq!(create_id_sort_key("rec002"), create_id_sort_key("rec2"));
    }

    #[test]
    fn test_mixed_runs() {
        let mut ids = vec!["a10b2", "a2b10", "a2b2"];
        ids.sort_by_key(|id| create_id_sort_key(id));
        assert_eq!(ids, vec!["a2b2", "a2b10", "a10b2"]);
    }

    #[test]
    fn test_no_digits() {
        assert_eq!(create_id_sort_key("abc"), "abc");
    }

    #[test]
    fn test_only_zeros() {
        assert_eq!(create_id_sort_key("000"), create_id_sort_key("0"));
    }
}
