//! The dedup engine: candidate search, group maintenance, repair
//!
//! One engine instance is shared by all workers. A single `dedup_record`
//! call is internally sequential; group read-modify-write cycles are
//! serialized through a keyed lock map and double-checked with
//! conditional saves, so concurrent workers on different subjects stay
//! consistent.

use crate::candidates::CandidateStream;
use crate::matching::{records_match, FormatMapper};
use crate::overload::ProbeOverloadRegistry;
use crate::store::RecordStore;
use crate::Result;
use bibdedup_formats::{now_millis, DedupGroup, MetadataView, Record, RecordFactory};
use bibdedup_filters::create_title_key;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How many times a nested `leave` may re-deduplicate group members
///
/// Detaching a record re-deduplicates the remaining members, which can
/// detach further records in turn. Beyond this depth the affected
/// members are only flagged `update_needed` and picked up by the next
/// driver sweep, bounding the recursion.
pub const MAX_REDEDUP_DEPTH: usize = 1;

/// Attempts for a conditional group save before giving up
const GROUP_SAVE_ATTEMPTS: usize = 3;

/// Counters accumulated across engine operations
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Subjects run through `dedup_record`
    pub subjects_processed: usize,
    /// Subjects that ended up in a group
    pub subjects_matched: usize,
    /// Fresh groups created
    pub groups_created: usize,
    /// Groups tombstoned after shrinking
    pub groups_removed: usize,
    /// Component parts matched through the cascade
    pub components_matched: usize,
}

/// The dedup engine over a document store
pub struct DedupEngine<S: RecordStore> {
    pub(crate) store: Arc<S>,
    pub(crate) factory: RecordFactory,
    pub(crate) mapper: Arc<dyn FormatMapper>,
    pub(crate) overload: Mutex<ProbeOverloadRegistry>,
    group_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    pub(crate) stats: Mutex<EngineStats>,
}

impl<S: RecordStore> DedupEngine<S> {
    pub fn new(store: Arc<S>, mapper: Arc<dyn FormatMapper>) -> Self {
        Self {
            store,
            factory: RecordFactory::new(),
            mapper,
            overload: Mutex::new(ProbeOverloadRegistry::new()),
            group_locks: Mutex::new(HashMap::new()),
            stats: Mutex::new(EngineStats::default()),
        }
    }

    /// Snapshot of the accumulated counters
    pub fn stats(&self) -> EngineStats {
        self.stats.lock().unwrap().clone()
    }

    pub(crate) fn view_for(&self, record: &Record) -> Result<Box<dyn MetadataView>> {
        Ok(self.factory.create_view(
            &record.format,
            &record.raw,
            &record.oai_id,
            &record.source_id,
        )?)
    }

    /// Recompute the candidate-key fields from a metadata view
    ///
    /// A key field whose recomputed set is empty is removed entirely.
    /// Returns whether any field changed.
    pub fn update_dedup_candidate_keys(
        &self,
        record: &mut Record,
        view: &dyn MetadataView,
    ) -> bool {
        let isbn_keys = non_empty(view.isbns());
        let id_keys = non_empty(view.unique_ids());
        let title_key = create_title_key(&view.title(false));
        let title_keys = non_empty(if title_key.is_empty() {
            Vec::new()
        } else {
            vec![title_key]
        });

        let changed = record.isbn_keys != isbn_keys
            || record.id_keys != id_keys
            || record.title_keys != title_keys;

        record.isbn_keys = isbn_keys;
        record.id_keys = id_keys;
        record.title_keys = title_keys;
        changed
    }

    /// Refresh a record's candidate keys from its own payload
    ///
    /// Convenience for ingestion: builds the view and recomputes keys.
    pub fn refresh_candidate_keys(&self, record: &mut Record) -> Result<bool> {
        let view = self.view_for(record)?;
        Ok(self.update_dedup_candidate_keys(record, view.as_ref()))
    }

    /// Deduplicate one subject record
    ///
    /// Returns whether the subject ended up in a dedup group.
    pub fn dedup_record(&self, record: &Record) -> Result<bool> {
        self.dedup_record_at(record, 0)
    }

    pub(crate) fn dedup_record_at(&self, record: &Record, depth: usize) -> Result<bool> {
        self.stats.lock().unwrap().subjects_processed += 1;

        let mut subject = record.clone();
        let view = self.view_for(&subject)?;

        // Keys must reflect the current payload before searching
        if self.update_dedup_candidate_keys(&mut subject, view.as_ref()) {
            self.store.save_record(&subject)?;
        }

        if !subject.deleted {
            let stream = CandidateStream::new(self.store.as_ref(), &self.overload, &subject);
            for candidate in stream {
                let candidate = candidate?;
                let candidate_view = match self.view_for(&candidate) {
                    Ok(view) => view,
                    Err(e) => {
                        error!("Cannot parse metadata of candidate {}: {}", candidate.id, e);
                        continue;
                    }
                };
                if records_match(
                    &subject,
                    view.as_ref(),
                    &candidate,
                    candidate_view.as_ref(),
                    self.mapper.as_ref(),
                ) && self.mark_duplicates(&subject, &candidate, depth)?
                {
                    self.stats.lock().unwrap().subjects_matched += 1;
                    return Ok(true);
                }
            }
        }

        // No candidate matched; release any stale group membership
        if subject.dedup_id.is_some() || subject.update_needed {
            let old_group = subject.dedup_id.take();
            subject.updated = now_millis();
            subject.update_needed = false;
            self.store.save_record(&subject)?;

            if let Some(group_id) = old_group {
                debug!("Record {} left dedup group {}", subject.id, group_id);
                let members = self.detach(&group_id, &subject.id)?;
                self.rededup_members(&members, depth)?;
            }
        }
        Ok(false)
    }

    /// Record that two records describe the same work
    ///
    /// Resolves the target group from the pair's current memberships,
    /// re-checks source uniqueness under the group lock, persists both
    /// records' dedup fields in one multi-update, and cascades to
    /// component parts when `a` is a host record. Returns `false` when a
    /// concurrent mutation made the pairing impossible.
    pub(crate) fn mark_duplicates(&self, a: &Record, b: &Record, depth: usize) -> Result<bool> {
        let Some(a_fresh) = self.store.record(&a.id)? else {
            error!("Record {} disappeared before grouping", a.id);
            return Ok(false);
        };
        let Some(b_fresh) = self.store.record(&b.id)? else {
            error!("Record {} disappeared before grouping", b.id);
            return Ok(false);
        };

        let target_group = if let Some(group_id) = b_fresh.dedup_id.clone() {
            self.join_group(&group_id, &a_fresh)?
        } else if let Some(group_id) = a_fresh.dedup_id.clone() {
            self.join_group(&group_id, &b_fresh)?
        } else {
            let group = DedupGroup::new(
                Uuid::new_v4().to_string(),
                a_fresh.id.clone(),
                b_fresh.id.clone(),
            );
            self.store.insert_group(&group)?;
            self.stats.lock().unwrap().groups_created += 1;
            info!(
                "Created dedup group {} for {} and {}",
                group.id, a_fresh.id, b_fresh.id
            );
            Some(group.id)
        };

        let Some(target_group) = target_group else {
            return Ok(false);
        };

        let already_grouped = |r: &Record| {
            r.dedup_id.as_deref() == Some(target_group.as_str()) && !r.update_needed
        };
        if !(already_grouped(&a_fresh) && already_grouped(&b_fresh)) {
            self.store.mark_deduplicated(
                &[a_fresh.id.clone(), b_fresh.id.clone()],
                Some(target_group.as_str()),
                now_millis(),
            )?;
        }

        // Joining a new group implies leaving the old one
        if let Some(old_group) = &a_fresh.dedup_id {
            if *old_group != target_group {
                let members = self.detach(old_group, &a_fresh.id)?;
                self.rededup_members(&members, depth)?;
            }
        }

        if a_fresh.host_record_id.is_empty() {
            if let Some(host) = self.store.record(&a_fresh.id)? {
                let matched = self.cascade_components(&host, depth)?;
                if matched > 0 {
                    debug!(
                        "Cascaded {} component pairs from host {}",
                        matched, host.id
                    );
                }
            }
        }

        Ok(true)
    }

    /// Add a record to an existing group under the group lock
    ///
    /// Returns the group id, or `None` when the group vanished or source
    /// uniqueness would be violated by the join.
    fn join_group(&self, group_id: &str, joiner: &Record) -> Result<Option<String>> {
        let lock = self.lock_for(group_id);
        let _guard = lock.lock().unwrap();

        let Some(mut group) = self.store.group(group_id)? else {
            error!("Record joins missing dedup group {}", group_id);
            return Ok(None);
        };
        if group.deleted {
            return Ok(None);
        }

        // Source uniqueness must hold at commit time: another worker may
        // have added a competing member after candidate filtering
        for member_id in &group.ids {
            if *member_id == joiner.id {
                continue;
            }
            let Some(member) = self.store.record(member_id)? else {
                error!("Dedup group {} refers to missing record {}", group.id, member_id);
                continue;
            };
            if !member.deleted && member.source_id == joiner.source_id {
                warn!(
                    "Not adding {} to dedup group {}: member {} shares source {}",
                    joiner.id, group.id, member.id, member.source_id
                );
                return Ok(None);
            }
        }

        if group.ids.iter().all(|id| *id != joiner.id) {
            let expected = group.changed;
            group.add_member(&joiner.id);
            group.changed = now_millis();
            if !self.store.save_group_if(&group, expected)? {
                warn!("Concurrent mutation of dedup group {}, retrying join", group.id);
                drop(_guard);
                return self.join_group(group_id, joiner);
            }
        }
        Ok(Some(group.id))
    }

    /// Remove a record from a group and normalize the remainder
    ///
    /// Handles the shrink-to-singleton and empty cases, stamps and saves
    /// the group, and returns the member ids that should be
    /// re-deduplicated (empty when the group did not survive).
    pub(crate) fn detach(&self, group_id: &str, record_id: &str) -> Result<Vec<String>> {
        let lock = self.lock_for(group_id);
        let _guard = lock.lock().unwrap();

        for _ in 0..GROUP_SAVE_ATTEMPTS {
            let Some(mut group) = self.store.group(group_id)? else {
                error!("Record {} leaves missing dedup group {}", record_id, group_id);
                return Ok(Vec::new());
            };
            let expected = group.changed;

            if !group.remove_member(record_id) {
                return Ok(Vec::new());
            }
            self.finalize_shrunk_group(&mut group)?;

            group.changed = now_millis();
            if self.store.save_group_if(&group, expected)? {
                let members = if group.is_live() { group.ids } else { Vec::new() };
                return Ok(members);
            }
            warn!("Concurrent mutation of dedup group {}, retrying removal", group_id);
        }
        warn!("Giving up removal of {} from contested group {}", record_id, group_id);
        Ok(Vec::new())
    }

    /// Post-removal normalization shared by `detach` and the checker
    fn finalize_shrunk_group(&self, group: &mut DedupGroup) -> Result<()> {
        match group.ids.len() {
            1 => {
                let orphan_id = group.ids[0].clone();
                if let Some(mut orphan) = self.store.record(&orphan_id)? {
                    orphan.dedup_id = None;
                    orphan.updated = now_millis();
                    self.store.save_record(&orphan)?;
                } else {
                    error!(
                        "Dedup group {} refers to missing record {}",
                        group.id, orphan_id
                    );
                }
                group.ids.clear();
                group.deleted = true;
                self.stats.lock().unwrap().groups_removed += 1;
            }
            0 => {
                // Should not normally occur; tombstone defensively
                group.deleted = true;
                self.stats.lock().unwrap().groups_removed += 1;
            }
            _ => {}
        }
        Ok(())
    }

    /// Re-deduplicate group members after a composition change
    ///
    /// Runs a nested dedup pass while under [`MAX_REDEDUP_DEPTH`];
    /// deeper than that the members are only flagged for the next sweep.
    fn rededup_members(&self, member_ids: &[String], depth: usize) -> Result<()> {
        for member_id in member_ids {
            let Some(member) = self.store.record(member_id)? else {
                error!("Cannot re-deduplicate missing record {}", member_id);
                continue;
            };
            if depth < MAX_REDEDUP_DEPTH {
                self.dedup_record_at(&member, depth + 1)?;
            } else {
                let mut member = member;
                member.update_needed = true;
                member.updated = now_millis();
                self.store.save_record(&member)?;
            }
        }
        Ok(())
    }

    /// Remove a record from its group, re-deduplicating the remainder
    pub fn leave(&self, group_id: &str, record_id: &str) -> Result<()> {
        let members = self.detach(group_id, record_id)?;
        self.rededup_members(&members, 0)
    }

    /// Verify and repair the record back-links of one group
    ///
    /// Members whose record is missing, deleted, or pointing at a
    /// different group are expelled. Returns human-readable repair lines,
    /// empty when the group was consistent.
    pub fn check_dedup_record(&self, group_id: &str) -> Result<Vec<String>> {
        let lock = self.lock_for(group_id);
        let _guard = lock.lock().unwrap();

        let Some(mut group) = self.store.group(group_id)? else {
            return Ok(vec![format!("Dedup group {group_id} not found")]);
        };
        if group.deleted {
            return Ok(Vec::new());
        }
        let expected = group.changed;

        let mut lines = Vec::new();
        let mut kept = Vec::with_capacity(group.ids.len());
        for member_id in &group.ids {
            match self.store.record(member_id)? {
                None => {
                    lines.push(format!(
                        "Removed missing record {member_id} from dedup group {}",
                        group.id
                    ));
                }
                Some(member) if member.deleted => {
                    lines.push(format!(
                        "Removed deleted record {member_id} from dedup group {}",
                        group.id
                    ));
                    if member.dedup_id.as_deref() == Some(group.id.as_str()) {
                        let mut member = member;
                        member.dedup_id = None;
                        member.updated = now_millis();
                        self.store.save_record(&member)?;
                    }
                }
                Some(member) if member.dedup_id.as_deref() != Some(group.id.as_str()) => {
                    lines.push(format!(
                        "Removed record {member_id} with mismatched back-link from dedup group {}",
                        group.id
                    ));
                }
                Some(_) => kept.push(member_id.clone()),
            }
        }

        if lines.is_empty() {
            return Ok(lines);
        }

        group.ids = kept;
        self.finalize_shrunk_group(&mut group)?;
        group.changed = now_millis();
        if !self.store.save_group_if(&group, expected)? {
            warn!("Concurrent mutation of dedup group {} during repair", group.id);
        }
        Ok(lines)
    }

    fn lock_for(&self, group_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.group_locks.lock().unwrap();
        locks
            .entry(group_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::IdentityFormatMapper;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn engine() -> DedupEngine<MemoryStore> {
        DedupEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(IdentityFormatMapper),
        )
    }

    fn dc_record(id: &str, source: &str, raw: serde_json::Value) -> Record {
        Record::new(id.to_string(), source.to_string(), "dc".to_string(), raw)
    }

    fn ingest(engine: &DedupEngine<MemoryStore>, mut record: Record) -> Record {
        engine.refresh_candidate_keys(&mut record).unwrap();
        engine.store.save_record(&record).unwrap();
        record
    }

    #[test]
    fn test_isbn_match_creates_fresh_group() {
        let engine = engine();
        let subject = ingest(
            &engine,
            dc_record(
                "a.1",
                "a",
                json!({"title": "alpha", "identifier": ["isbn:9780000000002"]}),
            ),
        );
        ingest(
            &engine,
            dc_record(
                "b.1",
                "b",
                json!({"title": "beta", "creator": "x", "identifier": ["isbn:9780000000002"]}),
            ),
        );

        assert!(engine.dedup_record(&subject).unwrap());

        let a = engine.store.record("a.1").unwrap().unwrap();
        let b = engine.store.record("b.1").unwrap().unwrap();
        let group_id = a.dedup_id.clone().unwrap();
        assert_eq!(b.dedup_id.as_deref(), Some(group_id.as_str()));
        assert!(!a.update_needed);
        assert!(!b.update_needed);

        let group = engine.store.group(&group_id).unwrap().unwrap();
        assert_eq!(group.ids, vec!["a.1", "b.1"]);
        assert!(group.is_live());
        assert_eq!(engine.stats().groups_created, 1);
    }

    #[test]
    fn test_issn_veto_prevents_grouping() {
        let engine = engine();
        let subject = ingest(
            &engine,
            dc_record(
                "a.1",
                "a",
                json!({"title": "gamma", "creator": "x", "identifier": ["issn:1111-1111"]}),
            ),
        );
        ingest(
            &engine,
            dc_record(
                "b.1",
                "b",
                json!({"title": "gamma", "creator": "x", "identifier": ["issn:2222-2222"]}),
            ),
        );

        assert!(!engine.dedup_record(&subject).unwrap());
        assert_eq!(engine.store.group_count().unwrap(), 0);
        assert!(engine.store.record("a.1").unwrap().unwrap().dedup_id.is_none());
    }

    #[test]
    fn test_same_source_never_grouped() {
        let engine = engine();
        let subject = ingest(
            &engine,
            dc_record(
                "a.1",
                "a",
                json!({"title": "alpha", "identifier": ["isbn:9780000000002"]}),
            ),
        );
        ingest(
            &engine,
            dc_record(
                "a.2",
                "a",
                json!({"title": "alpha", "identifier": ["isbn:9780000000002"]}),
            ),
        );

        assert!(!engine.dedup_record(&subject).unwrap());
        assert_eq!(engine.store.group_count().unwrap(), 0);
    }

    #[test]
    fn test_match_joins_existing_group() {
        let engine = engine();
        let first = ingest(
            &engine,
            dc_record(
                "a.1",
                "a",
                json!({"title": "alpha", "identifier": ["isbn:9780000000002"]}),
            ),
        );
        ingest(
            &engine,
            dc_record(
                "b.1",
                "b",
                json!({"title": "alpha", "identifier": ["isbn:9780000000002"]}),
            ),
        );
        assert!(engine.dedup_record(&first).unwrap());

        let third = ingest(
            &engine,
            dc_record(
                "c.1",
                "c",
                json!({"title": "alpha", "identifier": ["isbn:9780000000002"]}),
            ),
        );
        assert!(engine.dedup_record(&third).unwrap());

        assert_eq!(engine.store.group_count().unwrap(), 1);
        let group_id = engine
            .store
            .record("c.1")
            .unwrap()
            .unwrap()
            .dedup_id
            .unwrap();
        let group = engine.store.group(&group_id).unwrap().unwrap();
        assert_eq!(group.ids.len(), 3);
        assert_eq!(engine.stats().groups_created, 1);
    }

    #[test]
    fn test_leave_shrinks_group_to_tombstone() {
        let engine = engine();
        let subject = ingest(
            &engine,
            dc_record(
                "a.1",
                "a",
                json!({"title": "alpha", "identifier": ["isbn:9780000000002"]}),
            ),
        );
        ingest(
            &engine,
            dc_record(
                "b.1",
                "b",
                json!({"title": "alpha", "identifier": ["isbn:9780000000002"]}),
            ),
        );
        assert!(engine.dedup_record(&subject).unwrap());
        let group_id = engine
            .store
            .record("a.1")
            .unwrap()
            .unwrap()
            .dedup_id
            .unwrap();

        engine.leave(&group_id, "a.1").unwrap();

        let group = engine.store.group(&group_id).unwrap().unwrap();
        assert!(group.deleted);
        assert!(group.ids.is_empty());
        assert!(engine.store.record("b.1").unwrap().unwrap().dedup_id.is_none());
        assert_eq!(engine.stats().groups_removed, 1);
    }

    #[test]
    fn test_no_match_detaches_stale_membership() {
        let engine = engine();
        let subject = ingest(
            &engine,
            dc_record(
                "a.1",
                "a",
                json!({"title": "alpha", "identifier": ["isbn:9780000000002"]}),
            ),
        );
        ingest(
            &engine,
            dc_record(
                "b.1",
                "b",
                json!({"title": "alpha", "identifier": ["isbn:9780000000002"]}),
            ),
        );
        assert!(engine.dedup_record(&subject).unwrap());
        let group_id = engine
            .store
            .record("a.1")
            .unwrap()
            .unwrap()
            .dedup_id
            .unwrap();

        // The subject's payload diverges: different ISSN, different title
        let mut changed = engine.store.record("a.1").unwrap().unwrap();
        changed.raw = json!({"title": "completely different", "identifier": ["issn:1111-1111"]});
        changed.update_needed = true;
        engine.store.save_record(&changed).unwrap();

        assert!(!engine.dedup_record(&changed).unwrap());

        let a = engine.store.record("a.1").unwrap().unwrap();
        assert!(a.dedup_id.is_none());
        assert!(!a.update_needed);
        // Old keys were replaced by the refreshed ones
        assert_eq!(a.title_keys, Some(vec!["completelydifferent".to_string()]));
        assert!(a.isbn_keys.is_none());

        let group = engine.store.group(&group_id).unwrap().unwrap();
        assert!(group.deleted);
        assert!(engine.store.record("b.1").unwrap().unwrap().dedup_id.is_none());
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let engine = engine();
        let subject = ingest(
            &engine,
            dc_record(
                "a.1",
                "a",
                json!({"title": "alpha", "identifier": ["isbn:9780000000002"]}),
            ),
        );
        ingest(
            &engine,
            dc_record(
                "b.1",
                "b",
                json!({"title": "alpha", "identifier": ["isbn:9780000000002"]}),
            ),
        );

        assert!(engine.dedup_record(&subject).unwrap());
        let a_after_first = engine.store.record("a.1").unwrap().unwrap();
        let b_after_first = engine.store.record("b.1").unwrap().unwrap();
        let group_id = a_after_first.dedup_id.clone().unwrap();
        let group_after_first = engine.store.group(&group_id).unwrap().unwrap();

        assert!(engine.dedup_record(&a_after_first).unwrap());
        assert_eq!(engine.store.record("a.1").unwrap().unwrap(), a_after_first);
        assert_eq!(engine.store.record("b.1").unwrap().unwrap(), b_after_first);
        assert_eq!(
            engine.store.group(&group_id).unwrap().unwrap(),
            group_after_first
        );
        assert_eq!(engine.store.group_count().unwrap(), 1);
    }

    #[test]
    fn test_key_refresh_round_trip() {
        let engine = engine();
        let mut record = dc_record(
            "a.1",
            "a",
            json!({"title": "alpha", "identifier": ["isbn:9780000000002", "urn:x1"]}),
        );

        assert!(engine.refresh_candidate_keys(&mut record).unwrap());
        let first = record.clone();
        assert!(!engine.refresh_candidate_keys(&mut record).unwrap());
        assert_eq!(record, first);
        assert_eq!(record.isbn_keys, Some(vec!["9780000000002".to_string()]));
        assert_eq!(record.id_keys, Some(vec!["X1".to_string()]));
        assert_eq!(record.title_keys, Some(vec!["alpha".to_string()]));
    }

    #[test]
    fn test_check_dedup_record_expels_bad_members() {
        let engine = engine();

        let mut good_a = dc_record("a.1", "a", json!({"title": "alpha"}));
        good_a.dedup_id = Some("g1".to_string());
        good_a.update_needed = false;
        engine.store.save_record(&good_a).unwrap();

        let mut good_b = dc_record("b.1", "b", json!({"title": "alpha"}));
        good_b.dedup_id = Some("g1".to_string());
        good_b.update_needed = false;
        engine.store.save_record(&good_b).unwrap();

        // Back-link points elsewhere
        let mut stray = dc_record("c.1", "c", json!({"title": "alpha"}));
        stray.dedup_id = Some("g2".to_string());
        engine.store.save_record(&stray).unwrap();

        let group = DedupGroup {
            id: "g1".to_string(),
            ids: vec![
                "a.1".to_string(),
                "b.1".to_string(),
                "c.1".to_string(),
                "ghost".to_string(),
            ],
            deleted: false,
            changed: 1,
        };
        engine.store.save_group(&group).unwrap();

        let lines = engine.check_dedup_record("g1").unwrap();
        assert_eq!(lines.len(), 2);

        let group = engine.store.group("g1").unwrap().unwrap();
        assert_eq!(group.ids, vec!["a.1", "b.1"]);
        assert!(group.is_live());

        // Second pass finds nothing left to repair
        assert!(engine.check_dedup_record("g1").unwrap().is_empty());
    }

    #[test]
    fn test_check_dedup_record_tombstones_shrunken_group() {
        let engine = engine();

        let mut lone = dc_record("a.1", "a", json!({"title": "alpha"}));
        lone.dedup_id = Some("g1".to_string());
        engine.store.save_record(&lone).unwrap();

        let group = DedupGroup {
            id: "g1".to_string(),
            ids: vec!["a.1".to_string(), "ghost".to_string()],
            deleted: false,
            changed: 1,
        };
        engine.store.save_group(&group).unwrap();

        let lines = engine.check_dedup_record("g1").unwrap();
        assert_eq!(lines.len(), 1);

        let group = engine.store.group("g1").unwrap().unwrap();
        assert!(group.deleted);
        assert!(engine.store.record("a.1").unwrap().unwrap().dedup_id.is_none());
    }
}
