//! Candidate generation for a subject record
//!
//! Probes the store's candidate-key indexes in a fixed priority order
//! (ISBN, then unique id, then title) and yields plausible matches
//! lazily, so a consumer that matches early never pays for the rest.
//! Each category only yields candidates a higher-priority category would
//! not have found, and every probe runs under the budget guard.

use crate::overload::ProbeOverloadRegistry;
use crate::store::{RecordCursor, RecordStore};
use crate::{Error, Result};
use bibdedup_formats::{KeyField, Record};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, error};

struct ActiveProbe<'a> {
    field: KeyField,
    key: String,
    cursor: RecordCursor<'a>,
    processed: usize,
    limit: usize,
}

enum Step {
    Exhausted,
    Tripped,
    Candidate(KeyField, Record),
    Fail(Error),
}

/// Lazy stream of dedup candidates for one subject record
pub struct CandidateStream<'a, S: RecordStore> {
    store: &'a S,
    registry: &'a Mutex<ProbeOverloadRegistry>,
    subject: &'a Record,
    probes: VecDeque<(KeyField, String)>,
    active: Option<ActiveProbe<'a>>,
}

impl<'a, S: RecordStore> CandidateStream<'a, S> {
    /// Build the probe queue from the subject's stored keys
    pub fn new(
        store: &'a S,
        registry: &'a Mutex<ProbeOverloadRegistry>,
        subject: &'a Record,
    ) -> Self {
        let mut probes = VecDeque::new();
        for field in KeyField::PRIORITY_ORDER {
            for key in subject.keys(field) {
                if !key.is_empty() {
                    probes.push_back((field, key.clone()));
                }
            }
        }
        Self {
            store,
            registry,
            subject,
            probes,
            active: None,
        }
    }

    /// In-stream filtering applied before a candidate is yielded
    fn passes_filters(&self, field: KeyField, candidate: &Record) -> Result<bool> {
        if candidate.deleted || candidate.source_id == self.subject.source_id {
            return Ok(false);
        }

        // Suppress matches a higher-priority category already covers
        if matches!(field, KeyField::Id | KeyField::Title)
            && self.subject.shares_key(candidate, KeyField::Isbn)
        {
            return Ok(false);
        }
        if field == KeyField::Title && self.subject.shares_key(candidate, KeyField::Id) {
            return Ok(false);
        }

        // Joining the candidate's group must not put two records of the
        // subject's source into it
        if let Some(group_id) = &candidate.dedup_id {
            if self.subject.dedup_id.as_ref() != Some(group_id) {
                let Some(group) = self.store.group(group_id)? else {
                    error!(
                        "Record {} refers to missing dedup group {}",
                        candidate.id, group_id
                    );
                    return Ok(true);
                };
                for member_id in &group.ids {
                    let Some(member) = self.store.record(member_id)? else {
                        error!(
                            "Dedup group {} refers to missing record {}",
                            group.id, member_id
                        );
                        continue;
                    };
                    if !member.deleted && member.source_id == self.subject.source_id {
                        return Ok(false);
                    }
                }
            }
        }

        Ok(true)
    }

    /// Pull the next raw candidate from the active probe
    fn step(&mut self) -> Option<Step> {
        if self.active.is_none() {
            let (field, key) = self.probes.pop_front()?;
            let limit = self.registry.lock().unwrap().limit_for(field, &key);
            let cursor = match self.store.find_by_key(field, &key) {
                Ok(cursor) => cursor,
                Err(e) => return Some(Step::Fail(e)),
            };
            self.active = Some(ActiveProbe {
                field,
                key,
                cursor,
                processed: 0,
                limit,
            });
        }

        let probe = self.active.as_mut().expect("active probe just installed");
        match probe.cursor.next() {
            None => Some(Step::Exhausted),
            Some(Err(e)) => Some(Step::Fail(e)),
            Some(Ok(candidate)) => {
                probe.processed += 1;
                if probe.processed > probe.limit {
                    debug!(
                        "Too many candidates for probe {}={}, abandoning after {}",
                        probe.field.as_str(),
                        probe.key,
                        probe.limit
                    );
                    Some(Step::Tripped)
                } else {
                    Some(Step::Candidate(probe.field, candidate))
                }
            }
        }
    }
}

impl<S: RecordStore> Iterator for CandidateStream<'_, S> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.step()? {
                Step::Exhausted => {
                    self.active = None;
                }
                Step::Tripped => {
                    let probe = self.active.take().expect("tripped probe was active");
                    self.registry
                        .lock()
                        .unwrap()
                        .record_trip(probe.field, &probe.key);
                }
                Step::Fail(e) => return Some(Err(e)),
                Step::Candidate(field, candidate) => {
                    match self.passes_filters(field, &candidate) {
                        Ok(true) => return Some(Ok(candidate)),
                        Ok(false) => {}
                        Err(e) => return Some(Err(e)),
                    }
                }
            }
        }
    }
}
