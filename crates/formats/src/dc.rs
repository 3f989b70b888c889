//! Dublin-Core-style metadata view
//!
//! Parses the flat JSON convention used by OAI-PMH DC harvests after
//! XML-to-JSON conversion: scalar or array values under `title`,
//! `creator`, `identifier`, `date`, `format`, `extent`, plus the
//! repository extensions `series`, `series_number`, and `series_issn`.
//! Identifiers carry scheme prefixes (`isbn:`, `issn:`, `urn:`).

use crate::metadata::{
    extract_page_count, extract_year, normalize_isbn, normalize_issn, normalize_unique_id,
    MetadataView,
};
use crate::{Error, Result};
use bibdedup_filters::normalize;
use serde_json::Value;

/// Metadata view over a flat Dublin-Core-style payload
#[derive(Debug)]
pub struct DcView {
    raw: Value,
}

impl DcView {
    /// Parse a DC payload; the payload must be a JSON object
    pub fn parse(raw: &Value) -> Result<Self> {
        if !raw.is_object() {
            return Err(Error::InvalidPayload("DC payload is not an object".into()));
        }
        Ok(Self { raw: raw.clone() })
    }

    /// First scalar under `field`, whether stored bare or in an array
    fn first(&self, field: &str) -> Option<&str> {
        match self.raw.get(field) {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(Value::Array(items)) => items.iter().find_map(Value::as_str),
            _ => None,
        }
    }

    /// All scalars under `field`
    fn all(&self, field: &str) -> Vec<&str> {
        match self.raw.get(field) {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Identifier values carrying `scheme:` prefixes, prefix stripped
    fn identifiers_with_scheme(&self, scheme: &str) -> Vec<&str> {
        self.all("identifier")
            .into_iter()
            .filter_map(|id| {
                let (head, tail) = id.split_once(':')?;
                head.trim().eq_ignore_ascii_case(scheme).then(|| tail.trim())
            })
            .collect()
    }
}

impl MetadataView for DcView {
    fn title(&self, normalized: bool) -> String {
        let title = self.first("title").unwrap_or_default();
        if normalized {
            normalize(title)
        } else {
            title.to_string()
        }
    }

    fn full_title(&self) -> String {
        self.title(false)
    }

    fn isbns(&self) -> Vec<String> {
        let mut isbns = Vec::new();
        for value in self.identifiers_with_scheme("isbn") {
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
        for scheme in ["urn", "nbn"] {
            for value in self.identifiers_with_scheme(scheme) {
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
        for value in self.identifiers_with_scheme("issn") {
            if let Some(issn) = normalize_issn(value) {
                if !issns.contains(&issn) {
                    issns.push(issn);
                }
            }
        }
        issns
    }

    fn format(&self) -> String {
        self.first("format").unwrap_or("other").to_lowercase()
    }

    fn publication_year(&self) -> Option<i32> {
        self.first("date").and_then(extract_year)
    }

    fn page_count(&self) -> Option<u32> {
        self.first("extent").and_then(extract_page_count)
    }

    fn series_issn(&self) -> Option<String> {
        self.first("series_issn").and_then(normalize_issn)
    }

    fn series_numbering(&self) -> Option<String> {
        self.first("series_number").map(normalize)
    }

    fn main_author(&self) -> String {
        self.first("creator").unwrap_or_default().to_string()
    }
}
