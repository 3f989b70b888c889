//! Metadata view abstraction over raw record payloads
//!
//! Each source format implements the same read-only capability set; the
//! record factory is the dispatch site that turns a record's opaque `raw`
//! payload into a view keyed on the record's format tag.

use crate::dc::DcView;
use crate::marc::MarcView;
use crate::{Error, Result};
use serde_json::Value;

/// Read-only projection of a record's metadata payload
///
/// All strings are returned as stored; normalization for comparison is
/// the caller's concern except where `normalized` is requested.
pub trait MetadataView: Send + Sync + std::fmt::Debug {
    /// Main title; normalized form when requested
    fn title(&self, normalized: bool) -> String;

    /// Title including part designations, for display
    fn full_title(&self) -> String;

    /// ISBNs in canonical 13-digit form
    fn isbns(&self) -> Vec<String>;

    /// Other stable identifiers such as national bibliographic numbers
    fn unique_ids(&self) -> Vec<String>;

    /// ISSNs in canonical `NNNN-NNNN` form
    fn issns(&self) -> Vec<String>;

    /// Metadata-derived format of the described work
    fn format(&self) -> String;

    /// Publication year when the payload exposes one
    fn publication_year(&self) -> Option<i32>;

    /// Page count when the payload exposes one
    fn page_count(&self) -> Option<u32>;

    /// ISSN of the series the work belongs to
    fn series_issn(&self) -> Option<String>;

    /// Numbering within the series
    fn series_numbering(&self) -> Option<String>;

    /// Main author entry, empty when none
    fn main_author(&self) -> String;
}

/// Factory constructing metadata views from raw payloads
///
/// Dispatch is keyed on the source-declared format tag. Unknown tags are
/// a typed error so ingestion can reject them up front.
#[derive(Debug, Default, Clone)]
pub struct RecordFactory;

impl RecordFactory {
    pub fn new() -> Self {
        Self
    }

    /// Build a metadata view for a payload
    ///
    /// `oai_id` and `source_id` are accepted for parity with the harvest
    /// interface; the shipped views derive everything from the payload.
    pub fn create_view(
        &self,
        format: &str,
        raw: &Value,
        _oai_id: &str,
        _source_id: &str,
    ) -> Result<Box<dyn MetadataView>> {
        match format {
            "marc" => Ok(Box::new(MarcView::parse(raw)?)),
            "dc" => Ok(Box::new(DcView::parse(raw)?)),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Normalize an ISBN to canonical 13-digit form
///
/// Strips hyphens and spaces, accepts 10- and 13-digit forms, converts
/// ISBN-10 to ISBN-13 with a recomputed check digit. Returns `None` for
/// anything that is not a structurally valid ISBN.
pub fn normalize_isbn(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x' || *c == '-' || *c == ' ')
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    match cleaned.len() {
        13 if cleaned.chars().all(|c| c.is_ascii_digit()) => Some(cleaned),
        10 => {
            let body = &cleaned[..9];
            if !body.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let mut digits: Vec<u32> = format!("978{body}")
                .chars()
                .filter_map(|c| c.to_digit(10))
                .collect();
            let sum: u32 = digits
                .iter()
                .enumerate()
                .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
                .sum();
            digits.push((10 - sum % 10) % 10);
            Some(digits.iter().map(|d| d.to_string()).collect())
        }
        _ => None,
    }
}

/// Normalize an ISSN to canonical `NNNN-NNNN` form
pub fn normalize_issn(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.len() == 8
        && cleaned[..7].chars().all(|c| c.is_ascii_digit())
        && cleaned
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_digit() || c == 'X')
    {
        Some(format!("{}-{}", &cleaned[..4], &cleaned[4..]))
    } else {
        None
    }
}

/// Normalize a free-form unique identifier for key comparison
pub fn normalize_unique_id(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// First run of four or more digits interpreted as a year
pub(crate) fn extract_year(text: &str) -> Option<i32> {
    let mut run = String::new();
    for c in text.chars().chain(std::iter::once(' ')) {
        if c.is_ascii_digit() {
            run.push(c);
        } else {
            if run.len() == 4 {
                if let Ok(year) = run.parse::<i32>() {
                    if (1000..=2200).contains(&year) {
                        return Some(year);
                    }
                }
            }
            run.clear();
        }
    }
    None
}

/// First digit run interpreted as a page count
pub(crate) fn extract_page_count(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_isbn13_passthrough() {
        assert_eq!(
            normalize_isbn("978-0-201-89683-1"),
            Some("9780201896831".to_string())
        );
    }

    #[test]
    fn test_isbn10_conversion() {
        // 0-201-89683-4 is the ISBN-10 form of 978-0-201-89683-1
        assert_eq!(
            normalize_isbn("0-201-89683-4"),
            Some("9780201896831".to_string())
        );
    }

    #[test]
    fn test_isbn_trailing_qualifier() {
        assert_eq!(
            normalize_isbn("9780201896831 (hardback)"),
            Some("9780201896831".to_string())
        );
    }

    #[test]
    fn test_isbn_invalid() {
        assert_eq!(normalize_isbn("not-an-isbn"), None);
        assert_eq!(normalize_isbn("12345"), None);
    }

    #[test]
    fn test_issn_forms() {
        assert_eq!(normalize_issn("0028-0836"), Some("0028-0836".to_string()));
        assert_eq!(normalize_issn("00280836"), Some("0028-0836".to_string()));
        assert_eq!(normalize_issn("2049-363x"), Some("2049-363X".to_string()));
        assert_eq!(normalize_issn("123"), None);
    }

    #[test]
    fn test_unique_id() {
        assert_eq!(
            normalize_unique_id(" fi-fennica:99-1234 "),
            Some("FIFENNICA991234".to_string())
        );
        assert_eq!(normalize_unique_id("  "), None);
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("c1968."), Some(1968));
        assert_eq!(extract_year("[19--?]"), None);
        assert_eq!(extract_year("printed 12345 times"), None);
    }

    #[test]
    fn test_extract_page_count() {
        assert_eq!(extract_page_count("xii, 652 p."), Some(652));
        assert_eq!(extract_page_count("652 p."), Some(652));
        assert_eq!(extract_page_count("unpaged"), None);
    }

    #[test]
    fn test_factory_rejects_unknown_format() {
        let factory = RecordFactory::new();
        let err = factory
            .create_view("pdf", &json!({}), "", "source.a")
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }
}
