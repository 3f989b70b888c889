//! Document store abstraction
//!
//! The engine talks to its two collections, `record` and `dedup`, through
//! this trait: primary-id fetch, upsert, lazy equality probes on the
//! candidate-key indexes, and the multi-record dedup-field update. The
//! in-memory implementation here backs tests and dry runs; the sled
//! implementation lives in [`crate::sled_store`].

use crate::{Error, Result};
use bibdedup_formats::{DedupGroup, KeyField, Record};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

/// Lazy stream of records from an index probe
pub type RecordCursor<'a> = Box<dyn Iterator<Item = Result<Record>> + Send + 'a>;

/// Storage operations required by the dedup engine
pub trait RecordStore: Send + Sync {
    /// Fetch a record by primary id
    fn record(&self, id: &str) -> Result<Option<Record>>;

    /// Insert a new record; the id must not exist yet
    fn insert_record(&self, record: &Record) -> Result<()>;

    /// Upsert a record, keeping the candidate-key indexes in sync
    fn save_record(&self, record: &Record) -> Result<()>;

    /// Probe one candidate-key index by equality, yielding lazily
    fn find_by_key<'a>(&'a self, field: KeyField, key: &str) -> Result<RecordCursor<'a>>;

    /// All records with the given `(source_id, host_record_id)` pair
    fn components(&self, source_id: &str, host_record_id: &str) -> Result<Vec<Record>>;

    /// Records flagged for re-deduplication, in id order, up to `limit`
    fn update_needed(&self, limit: usize) -> Result<Vec<Record>>;

    /// Multi-record update of the dedup fields
    ///
    /// Sets `dedup_id`, `updated`, and clears `update_needed` on every
    /// listed record in one store round-trip.
    fn mark_deduplicated(&self, ids: &[String], dedup_id: Option<&str>, updated: i64)
        -> Result<()>;

    /// Fetch a dedup group by id
    fn group(&self, id: &str) -> Result<Option<DedupGroup>>;

    /// Insert a new group; the id must not exist yet
    fn insert_group(&self, group: &DedupGroup) -> Result<()>;

    /// Upsert a group unconditionally
    fn save_group(&self, group: &DedupGroup) -> Result<()>;

    /// Upsert a group only if its stored `changed` stamp still equals
    /// `expected_changed`; reports whether the write happened
    fn save_group_if(&self, group: &DedupGroup, expected_changed: i64) -> Result<bool>;

    /// Number of stored records
    fn record_count(&self) -> Result<usize>;

    /// Number of stored groups, tombstones included
    fn group_count(&self) -> Result<usize>;

    /// All group ids currently stored
    fn group_ids(&self) -> Result<Vec<String>>;
}

#[derive(Default)]
struct MemoryInner {
    records: HashMap<String, Record>,
    groups: HashMap<String, DedupGroup>,
    isbn_index: HashMap<String, BTreeSet<String>>,
    id_index: HashMap<String, BTreeSet<String>>,
    title_index: HashMap<String, BTreeSet<String>>,
    host_index: HashMap<(String, String), BTreeSet<String>>,
}

impl MemoryInner {
    fn index_mut(&mut self, field: KeyField) -> &mut HashMap<String, BTreeSet<String>> {
        match field {
            KeyField::Isbn => &mut self.isbn_index,
            KeyField::Id => &mut self.id_index,
            KeyField::Title => &mut self.title_index,
        }
    }

    fn index(&self, field: KeyField) -> &HashMap<String, BTreeSet<String>> {
        match field {
            KeyField::Isbn => &self.isbn_index,
            KeyField::Id => &self.id_index,
            KeyField::Title => &self.title_index,
        }
    }

    fn unindex_record(&mut self, record: &Record) {
        for field in KeyField::PRIORITY_ORDER {
            for key in record.keys(field).to_vec() {
                let index = self.index_mut(field);
                if let Some(ids) = index.get_mut(&key) {
                    ids.remove(&record.id);
                    if ids.is_empty() {
                        index.remove(&key);
                    }
                }
            }
        }
        if !record.host_record_id.is_empty() {
            let host_key = (record.source_id.clone(), record.host_record_id.clone());
            if let Some(ids) = self.host_index.get_mut(&host_key) {
                ids.remove(&record.id);
                if ids.is_empty() {
                    self.host_index.remove(&host_key);
                }
            }
        }
    }

    fn index_record(&mut self, record: &Record) {
        for field in KeyField::PRIORITY_ORDER {
            for key in record.keys(field).to_vec() {
                self.index_mut(field)
                    .entry(key)
                    .or_default()
                    .insert(record.id.clone());
            }
        }
        if !record.host_record_id.is_empty() {
            self.host_index
                .entry((record.source_id.clone(), record.host_record_id.clone()))
                .or_default()
                .insert(record.id.clone());
        }
    }

    fn put_record(&mut self, record: &Record) {
        if let Some(old) = self.records.remove(&record.id) {
            self.unindex_record(&old);
        }
        self.index_record(record);
        self.records.insert(record.id.clone(), record.clone());
    }
}

/// In-memory store for tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn record(&self, id: &str) -> Result<Option<Record>> {
        Ok(self.inner.read().unwrap().records.get(id).cloned())
    }

    fn insert_record(&self, record: &Record) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.records.contains_key(&record.id) {
            return Err(Error::DuplicateId(record.id.clone()));
        }
        inner.put_record(record);
        Ok(())
    }

    fn save_record(&self, record: &Record) -> Result<()> {
        self.inner.write().unwrap().put_record(record);
        Ok(())
    }

    fn find_by_key<'a>(&'a self, field: KeyField, key: &str) -> Result<RecordCursor<'a>> {
        let ids: Vec<String> = {
            let inner = self.inner.read().unwrap();
            inner
                .index(field)
                .get(key)
                .map(|ids| ids.iter().cloned().collect())
                .unwrap_or_default()
        };
        // Id snapshot is taken eagerly; record materialization is lazy so
        // early-stopping consumers skip the fetches
        Ok(Box::new(ids.into_iter().filter_map(
            move |id| match self.record(&id) {
                Ok(Some(record)) => Some(Ok(record)),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            },
        )))
    }

    fn components(&self, source_id: &str, host_record_id: &str) -> Result<Vec<Record>> {
        let inner = self.inner.read().unwrap();
        let key = (source_id.to_string(), host_record_id.to_string());
        Ok(inner
            .host_index
            .get(&key)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.records.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn update_needed(&self, limit: usize) -> Result<Vec<Record>> {
        let inner = self.inner.read().unwrap();
        let mut matches: Vec<&Record> = inner
            .records
            .values()
            .filter(|r| r.update_needed && !r.deleted)
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches.into_iter().take(limit).cloned().collect())
    }

    fn mark_deduplicated(
        &self,
        ids: &[String],
        dedup_id: Option<&str>,
        updated: i64,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        for id in ids {
            if let Some(mut record) = inner.records.get(id).cloned() {
                record.dedup_id = dedup_id.map(str::to_string);
                record.updated = updated;
                record.update_needed = false;
                inner.put_record(&record);
            }
        }
        Ok(())
    }

    fn group(&self, id: &str) -> Result<Option<DedupGroup>> {
        Ok(self.inner.read().unwrap().groups.get(id).cloned())
    }

    fn insert_group(&self, group: &DedupGroup) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.groups.contains_key(&group.id) {
            return Err(Error::DuplicateId(group.id.clone()));
        }
        inner.groups.insert(group.id.clone(), group.clone());
        Ok(())
    }

    fn save_group(&self, group: &DedupGroup) -> Result<()> {
        self.inner
            .write()
            .unwrap()
            .groups
            .insert(group.id.clone(), group.clone());
        Ok(())
    }

    fn save_group_if(&self, group: &DedupGroup, expected_changed: i64) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        match inner.groups.get(&group.id) {
            Some(stored) if stored.changed != expected_changed => Ok(false),
            _ => {
                inner.groups.insert(group.id.clone(), group.clone());
                Ok(true)
            }
        }
    }

    fn record_count(&self) -> Result<usize> {
        Ok(self.inner.read().unwrap().records.len())
    }

    fn group_count(&self) -> Result<usize> {
        Ok(self.inner.read().unwrap().groups.len())
    }

    fn group_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.inner.read().unwrap().groups.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
