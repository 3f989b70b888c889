//! MARC 21 metadata view
//!
//! Parses payloads in the MARC-in-JSON convention:
//! `{"leader": "...", "fields": [{"001": "..."}, {"245": {"ind1": " ",
//! "ind2": " ", "subfields": [{"a": "Title"}]}}]}`.

use crate::metadata::{
    extract_page_count, extract_year, normalize_isbn, normalize_issn, normalize_unique_id,
    MetadataView,
};
use crate::{Error, Result};
use bibdedup_filters::normalize;
use serde_json::Value;

/// Metadata view over a MARC 21 payload
#[derive(Debug)]
pub struct MarcView {
    leader: String,
    // (tag, content) in record order; content is a string for control
    // fields and an object with "subfields" for data fields
    fields: Vec<(String, Value)>,
}

impl MarcView {
    /// Parse a MARC-in-JSON payload
    pub fn parse(raw: &Value) -> Result<Self> {
        let field_list = raw
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::InvalidPayload("MARC payload missing fields array".into()))?;

        let mut fields = Vec::with_capacity(field_list.len());
        for entry in field_list {
            let obj = entry
                .as_object()
                .ok_or_else(|| Error::InvalidPayload("MARC field entry is not an object".into()))?;
            for (tag, content) in obj {
                fields.push((tag.clone(), content.clone()));
            }
        }

        Ok(Self {
            leader: raw
                .get("leader")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            fields,
        })
    }

    fn control_field(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(t, v)| t == tag && v.is_string())
            .and_then(|(_, v)| v.as_str())
    }

    /// All values of `code` subfields under fields with `tag`, in order
    fn subfields(&self, tag: &str, code: &str) -> Vec<&str> {
        let mut values = Vec::new();
        for (t, content) in &self.fields {
            if t != tag {
                continue;
            }
            let Some(subfields) = content.get("subfields").and_then(Value::as_array) else {
                continue;
            };
            for sub in subfields {
                if let Some(v) = sub.get(code).and_then(Value::as_str) {
                    values.push(v);
                }
            }
        }
        values
    }

    fn first_subfield(&self, tag: &str, code: &str) -> Option<&str> {
        self.subfields(tag, code).into_iter().next()
    }
}

/// Strip ISBD field-terminating punctuation
fn trim_isbd(text: &str) -> &str {
    text.trim_end_matches([' ', '/', ':', ';', ',', '.', '='])
}

impl MetadataView for MarcView {
    fn title(&self, normalized: bool) -> String {
        let mut parts = Vec::new();
        if let Some(a) = self.first_subfield("245", "a") {
            parts.push(trim_isbd(a));
        }
        if let Some(b) = self.first_subfield("245", "b") {
            parts.push(trim_isbd(b));
        }
        let title = parts.join(" ");
        if normalized {
            normalize(&title)
        } else {
            title
        }
    }

    fn full_title(&self) -> String {
        let mut parts = Vec::new();
        for code in ["a", "b", "n", "p"] {
            for value in self.subfields("245", code) {
                parts.push(trim_isbd(value));
            }
        }
        parts.join(" ")
    }

    fn isbns(&self) -> Vec<String> {
        let mut isbns = Vec::new();
        for value in self.subfields("020", "a") {
            if let Some(isbn) = normalize_isbn(value) {
                if !isbns.contains(&isbn) {
                    isbns.push(isbn);
                }
            }
        }
        isbns
    }

    fn unique_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for tag in ["015", "016", "024"] {
            for value in self.subfields(tag, "a") {
                if let Some(id) = normalize_unique_id(value) {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
        }
        ids
    }

    fn issns(&self) -> Vec<String> {
        let mut issns = Vec::new();
        for value in self.subfields("022", "a") {
            if let Some(issn) = normalize_issn(value) {
                if !issns.contains(&issn) {
                    issns.push(issn);
                }
            }
        }
        issns
    }

    fn format(&self) -> String {
        let record_type = self.leader.chars().nth(6).unwrap_or(' ');
        let bib_level = self.leader.chars().nth(7).unwrap_or(' ');

        match (record_type, bib_level) {
            ('a', 's') => "journal",
            ('a', 'b') | ('a', 'a') => "article",
            ('a', _) | ('t', _) => "book",
            ('c', _) | ('d', _) => "score",
            ('e', _) | ('f', _) => "map",
            ('i', _) | ('j', _) => "audio",
            ('g', _) => "video",
            ('m', _) => "electronic",
            _ => "other",
        }
        .to_string()
    }

    fn publication_year(&self) -> Option<i32> {
        if let Some(f008) = self.control_field("008") {
            if f008.len() >= 11 {
                if let Ok(year) = f008[7..11].parse::<i32>() {
                    if (1000..=2200).contains(&year) {
                        return Some(year);
                    }
                }
            }
        }
        for tag in ["260", "264"] {
            if let Some(c) = self.first_subfield(tag, "c") {
                if let Some(year) = extract_year(c) {
                    return Some(year);
                }
            }
        }
        None
    }

    fn page_count(&self) -> Option<u32> {
        self.first_subfield("300", "a").and_then(extract_page_count)
    }

    fn series_issn(&self) -> Option<String> {
        for tag in ["490", "830"] {
            if let Some(issn) = self.first_subfield(tag, "x").and_then(normalize_issn) {
                return Some(issn);
            }
        }
        None
    }

    fn series_numbering(&self) -> Option<String> {
        for tag in ["490", "830"] {
            if let Some(v) = self.first_subfield(tag, "v") {
                return Some(normalize(v));
            }
        }
        None
    }

    fn main_author(&self) -> String {
        for tag in ["100", "110"] {
            if let Some(a) = self.first_subfield(tag, "a") {
                return trim_isbd(a).to_string();
            }
        }
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "leader": "01234nam a22003618i 4500",
            "fields": [
                {"001": "12345"},
                {"008": "850101s1968    xxu           000 0 eng  "},
                {"020": {"subfields": [{"a": "978-0-201-89683-1 (hbk.)"}]}},
                {"015": {"subfields": [{"a": "fi-12345"}]}},
                {"100": {"subfields": [{"a": "Knuth, Donald E.,"}, {"e": "author."}]}},
                {"245": {"ind1": "1", "ind2": "4", "subfields": [
                    {"a": "The art of computer programming /"},
                    {"b": "fundamental algorithms."}
                ]}},
                {"260": {"subfields": [{"c": "c1968."}]}},
                {"300": {"subfields": [{"a": "xxi, 652 pages :"}]}},
                {"490": {"subfields": [
                    {"a": "Addison-Wesley series in computer science"},
                    {"v": "vol. 1"}
                ]}}
            ]
        })
    }

    #[test]
    fn test_title() {
        let view = MarcView::parse(&sample()).unwrap();
        assert_eq!(
            view.title(false),
            "The art of computer programming fundamental algorithms"
        );
        assert_eq!(
            view.title(true),
            "the art of computer programming fundamental algorithms"
        );
    }

    #[test]
    fn test_identifiers() {
        let view = MarcView::parse(&sample()).unwrap();
        assert_eq!(view.isbns(), vec!["9780201896831"]);
        assert_eq!(view.unique_ids(), vec!["FI12345"]);
        assert!(view.issns().is_empty());
    }

    #[test]
    fn test_structural_fields() {
        let view = MarcView::parse(&sample()).unwrap();
        assert_eq!(view.publication_year(), Some(1968));
        assert_eq!(view.page_count(), Some(652));
        assert_eq!(view.main_author(), "Knuth, Donald E.");
        assert_eq!(view.format(), "book");
        assert_eq!(view.series_numbering(), Some("vol 1".to_string()));
        assert_eq!(view.series_issn(), None);
    }

    #[test]
    fn test_year_falls_back_to_260() {
        let mut raw = sample();
        raw["fields"][1] = json!({"008": "short"});
        let view = MarcView::parse(&raw).unwrap();
        assert_eq!(view.publication_year(), Some(1968));
    }

    #[test]
    fn test_serial_format() {
        let raw = json!({
            "leader": "01234nas a22003618i 4500",
            "fields": [{"245": {"subfields": [{"a": "Nature"}]}}]
        });
        let view = MarcView::parse(&raw).unwrap();
        assert_eq!(view.format(), "journal");
    }

    #[test]
    fn test_missing_fields_array() {
        assert!(MarcView::parse(&json!({"leader": "x"})).is_err());
    }
}
