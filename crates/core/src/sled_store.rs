//! Disk-backed document store on sled
//!
//! Records and groups are JSON documents in the `record` and `dedup`
//! trees. Each candidate-key index is its own tree whose entries are
//! `{key}\0{record_id}` with empty values, so an equality probe is a
//! prefix scan and stays lazy.

use crate::store::{RecordCursor, RecordStore};
use crate::{Error, Result};
use bibdedup_formats::{DedupGroup, KeyField, Record};
use std::path::Path;

const KEY_SEPARATOR: u8 = 0x00;
const HOST_KEY_SEPARATOR: u8 = 0x1f;

/// sled-backed implementation of [`RecordStore`]
pub struct SledStore {
    db: sled::Db,
    records: sled::Tree,
    groups: sled::Tree,
    isbn_index: sled::Tree,
    id_index: sled::Tree,
    title_index: sled::Tree,
    host_index: sled::Tree,
}

impl SledStore {
    /// Open or create a store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Limit sled page cache to 64 MB (default 1 GB is wasteful here)
        let db = sled::Config::new()
            .path(path)
            .cache_capacity(64 * 1024 * 1024)
            .open()?;
        Ok(Self {
            records: db.open_tree("record")?,
            groups: db.open_tree("dedup")?,
            isbn_index: db.open_tree("idx_isbn_keys")?,
            id_index: db.open_tree("idx_id_keys")?,
            title_index: db.open_tree("idx_title_keys")?,
            host_index: db.open_tree("idx_host")?,
            db,
        })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn index_tree(&self, field: KeyField) -> &sled::Tree {
        match field {
            KeyField::Isbn => &self.isbn_index,
            KeyField::Id => &self.id_index,
            KeyField::Title => &self.title_index,
        }
    }

    fn index_entry(key: &str, record_id: &str) -> Vec<u8> {
        let mut entry = Vec::with_capacity(key.len() + 1 + record_id.len());
        entry.extend_from_slice(key.as_bytes());
        entry.push(KEY_SEPARATOR);
        entry.extend_from_slice(record_id.as_bytes());
        entry
    }

    fn host_entry(source_id: &str, host_record_id: &str, record_id: &str) -> Vec<u8> {
        let mut entry = Self::host_prefix(source_id, host_record_id);
        entry.extend_from_slice(record_id.as_bytes());
        entry
    }

    fn host_prefix(source_id: &str, host_record_id: &str) -> Vec<u8> {
        let mut prefix =
            Vec::with_capacity(source_id.len() + host_record_id.len() + 2);
        prefix.extend_from_slice(source_id.as_bytes());
        prefix.push(HOST_KEY_SEPARATOR);
        prefix.extend_from_slice(host_record_id.as_bytes());
        prefix.push(KEY_SEPARATOR);
        prefix
    }

    fn unindex_record(&self, record: &Record) -> Result<()> {
        for field in KeyField::PRIORITY_ORDER {
            for key in record.keys(field) {
                self.index_tree(field)
                    .remove(Self::index_entry(key, &record.id))?;
            }
        }
        if !record.host_record_id.is_empty() {
            self.host_index.remove(Self::host_entry(
                &record.source_id,
                &record.host_record_id,
                &record.id,
            ))?;
        }
        Ok(())
    }

    fn index_record(&self, record: &Record) -> Result<()> {
        for field in KeyField::PRIORITY_ORDER {
            for key in record.keys(field) {
                self.index_tree(field)
                    .insert(Self::index_entry(key, &record.id), vec![])?;
            }
        }
        if !record.host_record_id.is_empty() {
            self.host_index.insert(
                Self::host_entry(&record.source_id, &record.host_record_id, &record.id),
                vec![],
            )?;
        }
        Ok(())
    }

    fn put_record(&self, record: &Record) -> Result<()> {
        if let Some(old_bytes) = self.records.get(record.id.as_bytes())? {
            let old: Record = serde_json::from_slice(&old_bytes)?;
            self.unindex_record(&old)?;
        }
        self.index_record(record)?;
        self.records
            .insert(record.id.as_bytes(), serde_json::to_vec(record)?)?;
        Ok(())
    }

    fn decode_record(bytes: &[u8]) -> Result<Record> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl RecordStore for SledStore {
    fn record(&self, id: &str) -> Result<Option<Record>> {
        self.records
            .get(id.as_bytes())?
            .map(|bytes| Self::decode_record(&bytes))
            .transpose()
    }

    fn insert_record(&self, record: &Record) -> Result<()> {
        if self.records.contains_key(record.id.as_bytes())? {
            return Err(Error::DuplicateId(record.id.clone()));
        }
        self.put_record(record)
    }

    fn save_record(&self, record: &Record) -> Result<()> {
        self.put_record(record)
    }

    fn find_by_key<'a>(&'a self, field: KeyField, key: &str) -> Result<RecordCursor<'a>> {
        let mut prefix = key.as_bytes().to_vec();
        prefix.push(KEY_SEPARATOR);
        let prefix_len = prefix.len();
        let records = self.records.clone();

        Ok(Box::new(self.index_tree(field).scan_prefix(prefix).filter_map(
            move |entry| match entry {
                Ok((index_key, _)) => {
                    let record_id = index_key[prefix_len..].to_vec();
                    match records.get(&record_id) {
                        Ok(Some(bytes)) => Some(Self::decode_record(&bytes)),
                        // Stale index entry for a removed document
                        Ok(None) => None,
                        Err(e) => Some(Err(e.into())),
                    }
                }
                Err(e) => Some(Err(e.into())),
            },
        )))
    }

    fn components(&self, source_id: &str, host_record_id: &str) -> Result<Vec<Record>> {
        let prefix = Self::host_prefix(source_id, host_record_id);
        let prefix_len = prefix.len();
        let mut result = Vec::new();
        for entry in self.host_index.scan_prefix(prefix) {
            let (index_key, _) = entry?;
            let record_id = &index_key[prefix_len..];
            if let Some(bytes) = self.records.get(record_id)? {
                result.push(Self::decode_record(&bytes)?);
            }
        }
        Ok(result)
    }

    fn update_needed(&self, limit: usize) -> Result<Vec<Record>> {
        let mut result = Vec::new();
        for entry in self.records.iter() {
            let (_, bytes) = entry?;
            let record = Self::decode_record(&bytes)?;
            if record.update_needed && !record.deleted {
                result.push(record);
                if result.len() >= limit {
                    break;
                }
            }
        }
        Ok(result)
    }

    fn mark_deduplicated(
        &self,
        ids: &[String],
        dedup_id: Option<&str>,
        updated: i64,
    ) -> Result<()> {
        for id in ids {
            if let Some(bytes) = self.records.get(id.as_bytes())? {
                let mut record = Self::decode_record(&bytes)?;
                record.dedup_id = dedup_id.map(str::to_string);
                record.updated = updated;
                record.update_needed = false;
                self.records
                    .insert(id.as_bytes(), serde_json::to_vec(&record)?)?;
            }
        }
        Ok(())
    }

    fn group(&self, id: &str) -> Result<Option<DedupGroup>> {
        self.groups
            .get(id.as_bytes())?
            .map(|bytes| Ok(serde_json::from_slice(&bytes)?))
            .transpose()
    }

    fn insert_group(&self, group: &DedupGroup) -> Result<()> {
        if self.groups.contains_key(group.id.as_bytes())? {
            return Err(Error::DuplicateId(group.id.clone()));
        }
        self.groups
            .insert(group.id.as_bytes(), serde_json::to_vec(group)?)?;
        Ok(())
    }

    fn save_group(&self, group: &DedupGroup) -> Result<()> {
        self.groups
            .insert(group.id.as_bytes(), serde_json::to_vec(group)?)?;
        Ok(())
    }

    fn save_group_if(&self, group: &DedupGroup, expected_changed: i64) -> Result<bool> {
        let current = self.groups.get(group.id.as_bytes())?;
        if let Some(ref bytes) = current {
            let stored: DedupGroup = serde_json::from_slice(bytes)?;
            if stored.changed != expected_changed {
                return Ok(false);
            }
        }
        // Compare-and-swap against the exact bytes we read, so a racing
        // writer between the read and the write is still detected
        let swapped = self
            .groups
            .compare_and_swap(
                group.id.as_bytes(),
                current,
                Some(serde_json::to_vec(group)?),
            )?
            .is_ok();
        Ok(swapped)
    }

    fn record_count(&self) -> Result<usize> {
        Ok(self.records.len())
    }

    fn group_count(&self) -> Result<usize> {
        Ok(self.groups.len())
    }

    fn group_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in self.groups.iter() {
            let (key, _) = entry?;
            ids.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, SledStore) {
        let dir = TempDir::new().unwrap();
        let store = SledStore::open(dir.path().join("db")).unwrap();
        (dir, store)
    }

    fn record(id: &str, source: &str) -> Record {
        Record::new(
            id.to_string(),
            source.to_string(),
            "dc".to_string(),
            json!({}),
        )
    }

    #[test]
    fn test_record_round_trip() {
        let (_dir, store) = open_store();
        let mut r = record("a.1", "a");
        r.isbn_keys = Some(vec!["9780001".to_string()]);
        store.insert_record(&r).unwrap();

        let loaded = store.record("a.1").unwrap().unwrap();
        assert_eq!(loaded, r);
        assert!(store.insert_record(&r).is_err());
    }

    #[test]
    fn test_prefix_probe_isolation() {
        let (_dir, store) = open_store();
        let mut r1 = record("a.1", "a");
        r1.title_keys = Some(vec!["alpha".to_string()]);
        store.save_record(&r1).unwrap();
        let mut r2 = record("b.1", "b");
        r2.title_keys = Some(vec!["alphabet".to_string()]);
        store.save_record(&r2).unwrap();

        // "alpha" must not match the "alphabet" entry despite the
        // shared prefix
        let hits: Vec<Record> = store
            .find_by_key(KeyField::Title, "alpha")
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a.1");
    }

    #[test]
    fn test_reindex_on_save() {
        let (_dir, store) = open_store();
        let mut r = record("a.1", "a");
        r.isbn_keys = Some(vec!["9780001".to_string()]);
        store.save_record(&r).unwrap();

        r.isbn_keys = None;
        store.save_record(&r).unwrap();
        assert_eq!(store.find_by_key(KeyField::Isbn, "9780001").unwrap().count(), 0);
    }

    #[test]
    fn test_components_and_host_index() {
        let (_dir, store) = open_store();
        let mut c = record("a.c1", "a");
        c.host_record_id = "host-1".to_string();
        store.save_record(&c).unwrap();

        assert_eq!(store.components("a", "host-1").unwrap().len(), 1);
        assert!(store.components("a", "host").unwrap().is_empty());
    }

    #[test]
    fn test_conditional_group_save() {
        let (_dir, store) = open_store();
        let mut g = DedupGroup::new("g1".to_string(), "a.1".to_string(), "b.1".to_string());
        g.changed = 100;
        store.insert_group(&g).unwrap();

        let mut update = g.clone();
        update.changed = 200;
        assert!(store.save_group_if(&update, 100).unwrap());
        assert!(!store.save_group_if(&update, 100).unwrap());
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        {
            let store = SledStore::open(&path).unwrap();
            store.save_record(&record("a.1", "a")).unwrap();
            store.flush().unwrap();
        }
        let store = SledStore::open(&path).unwrap();
        assert!(store.record("a.1").unwrap().is_some());
    }
}
