//! Component-part cascade
//!
//! When two host records are matched, their component parts (chapters,
//! articles) should pair up too. Both sides' components are iterated in
//! canonical id-sort order and matched positionally; the cascade is
//! all-or-nothing per host pair, so a single failing pair discards the
//! whole attempt.

use crate::engine::DedupEngine;
use crate::matching::records_match;
use crate::store::RecordStore;
use crate::Result;
use bibdedup_filters::create_id_sort_key;
use bibdedup_formats::Record;
use tracing::{debug, error};

impl<S: RecordStore> DedupEngine<S> {
    /// Attempt to lift a host record's match onto its component parts
    ///
    /// Returns the number of component pairs grouped, 0 when no other
    /// group member produced a full positional match.
    pub fn dedup_component_parts(&self, host: &Record) -> Result<usize> {
        self.cascade_components(host, 0)
    }

    pub(crate) fn cascade_components(&self, host: &Record, depth: usize) -> Result<usize> {
        if host.linking_id.is_empty() {
            error!("Host record {} has no linking id", host.id);
            return Ok(0);
        }
        let Some(group_id) = host.dedup_id.clone() else {
            debug!("Host record {} is not in a dedup group", host.id);
            return Ok(0);
        };
        let Some(group) = self.store.group(&group_id)? else {
            error!("Record {} refers to missing dedup group {}", host.id, group_id);
            return Ok(0);
        };

        let own_components = self.sorted_components(&host.source_id, &host.linking_id)?;
        if own_components.is_empty() {
            return Ok(0);
        }

        for member_id in &group.ids {
            if *member_id == host.id {
                continue;
            }
            let Some(other_host) = self.store.record(member_id)? else {
                error!("Dedup group {} refers to missing record {}", group.id, member_id);
                continue;
            };
            if other_host.deleted
                || other_host.source_id == host.source_id
                || other_host.linking_id.is_empty()
            {
                continue;
            }

            let other_components =
                self.sorted_components(&other_host.source_id, &other_host.linking_id)?;
            if other_components.len() != own_components.len() {
                debug!(
                    "Component counts differ between hosts {} and {} ({} vs {})",
                    host.id,
                    other_host.id,
                    own_components.len(),
                    other_components.len()
                );
                continue;
            }

            if let Some(matched) =
                self.match_component_sets(&own_components, &other_components, depth)?
            {
                self.stats.lock().unwrap().components_matched += matched;
                return Ok(matched);
            }
        }
        Ok(0)
    }

    /// Pair two equally-sized component sequences positionally
    ///
    /// Returns `None` unless every positional pair satisfies the match
    /// predicate; partial success is discarded.
    fn match_component_sets(
        &self,
        own: &[Record],
        other: &[Record],
        depth: usize,
    ) -> Result<Option<usize>> {
        let mut pairs = Vec::with_capacity(own.len());
        for (component, counterpart) in own.iter().zip(other.iter()) {
            let component_view = match self.view_for(component) {
                Ok(view) => view,
                Err(e) => {
                    error!("Cannot parse metadata of component {}: {}", component.id, e);
                    return Ok(None);
                }
            };
            let counterpart_view = match self.view_for(counterpart) {
                Ok(view) => view,
                Err(e) => {
                    error!("Cannot parse metadata of component {}: {}", counterpart.id, e);
                    return Ok(None);
                }
            };
            if !records_match(
                component,
                component_view.as_ref(),
                counterpart,
                counterpart_view.as_ref(),
                self.mapper.as_ref(),
            ) {
                return Ok(None);
            }
            pairs.push((component, counterpart));
        }

        let mut matched = 0;
        for (component, counterpart) in pairs {
            if self.mark_duplicates(component, counterpart, depth)? {
                matched += 1;
            }
        }
        Ok(Some(matched))
    }

    /// Non-deleted components of a host in canonical id-sort order
    fn sorted_components(&self, source_id: &str, linking_id: &str) -> Result<Vec<Record>> {
        let mut components: Vec<Record> = self
            .store
            .components(source_id, linking_id)?
            .into_iter()
            .filter(|r| !r.deleted)
            .collect();
        components.sort_by_cached_key(|r| create_id_sort_key(&r.id));
        Ok(components)
    }
}
