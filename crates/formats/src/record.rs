//! Bibliographic record and dedup group documents

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as epoch milliseconds
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A bibliographic record harvested from one catalog source
///
/// The `raw` payload is opaque to the engine and parsed on demand into a
/// metadata view. The three candidate-key sets are derived from the view
/// and kept in sync with `raw`; a key field is absent rather than empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Globally unique record identifier
    pub id: String,
    /// Identifier of the originating catalog
    pub source_id: String,
    /// Source-declared metadata format tag
    pub format: String,
    /// Upstream harvest identifier, empty when unknown
    #[serde(default)]
    pub oai_id: String,
    /// Tombstone flag set by ingestion
    #[serde(default)]
    pub deleted: bool,
    /// Opaque serialized metadata payload
    pub raw: Value,
    /// Normalized title keys for candidate generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_keys: Option<Vec<String>>,
    /// Normalized ISBN keys for candidate generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn_keys: Option<Vec<String>>,
    /// Other normalized unique-id keys for candidate generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_keys: Option<Vec<String>>,
    /// Host record this record is a component part of, empty when none
    #[serde(default)]
    pub host_record_id: String,
    /// Local identifier component parts use to refer to this record
    #[serde(default)]
    pub linking_id: String,
    /// Dedup group currently containing this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_id: Option<String>,
    /// Re-deduplication requested
    #[serde(default)]
    pub update_needed: bool,
    /// Last mutation time, epoch milliseconds
    #[serde(default)]
    pub updated: i64,
}

impl Record {
    /// Create a record fresh from harvest, queued for deduplication
    pub fn new(id: String, source_id: String, format: String, raw: Value) -> Self {
        Self {
            id,
            source_id,
            format,
            oai_id: String::new(),
            deleted: false,
            raw,
            title_keys: None,
            isbn_keys: None,
            id_keys: None,
            host_record_id: String::new(),
            linking_id: String::new(),
            dedup_id: None,
            update_needed: true,
            updated: now_millis(),
        }
    }

    /// Whether this record is a component part of a host record
    pub fn is_component_part(&self) -> bool {
        !self.host_record_id.is_empty()
    }

    /// Keys stored for one candidate index, empty slice when absent
    pub fn keys(&self, field: KeyField) -> &[String] {
        let keys = match field {
            KeyField::Isbn => &self.isbn_keys,
            KeyField::Id => &self.id_keys,
            KeyField::Title => &self.title_keys,
        };
        keys.as_deref().unwrap_or(&[])
    }

    /// Whether any key of `field` is shared with `other`
    pub fn shares_key(&self, other: &Record, field: KeyField) -> bool {
        let mine = self.keys(field);
        other.keys(field).iter().any(|k| mine.contains(k))
    }
}

/// The three indexed candidate-key fields, in probe priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyField {
    Isbn,
    Id,
    Title,
}

impl KeyField {
    /// All fields in candidate-generation priority order
    pub const PRIORITY_ORDER: [KeyField; 3] = [KeyField::Isbn, KeyField::Id, KeyField::Title];

    /// Stable name used for index storage and logging
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyField::Isbn => "isbn_keys",
            KeyField::Id => "id_keys",
            KeyField::Title => "title_keys",
        }
    }
}

/// A persistent equivalence class of records describing the same work
///
/// A live group always has at least two members; shrinking below that
/// tombstones the group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupGroup {
    /// Unique group identifier
    pub id: String,
    /// Member record ids in insertion order
    pub ids: Vec<String>,
    /// Tombstone flag
    #[serde(default)]
    pub deleted: bool,
    /// Last mutation time, epoch milliseconds
    #[serde(default)]
    pub changed: i64,
}

impl DedupGroup {
    /// Create a live group from an initial member pair
    pub fn new(id: String, first: String, second: String) -> Self {
        Self {
            id,
            ids: vec![first, second],
            deleted: false,
            changed: now_millis(),
        }
    }

    /// Whether the group is live
    pub fn is_live(&self) -> bool {
        !self.deleted && self.ids.len() >= 2
    }

    /// Add a member id unless already present
    pub fn add_member(&mut self, id: &str) {
        if !self.ids.iter().any(|m| m == id) {
            self.ids.push(id.to_string());
        }
    }

    /// Remove a member id if present, reporting whether it was there
    pub fn remove_member(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|m| m != id);
        self.ids.len() != before
    }
}
