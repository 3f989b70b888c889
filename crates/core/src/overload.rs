//! Registry of candidate probes that tripped the budget guard
//!
//! A pathological key (a generic title shared by thousands of records)
//! must not dominate runtime. The first time a probe exceeds the normal
//! candidate budget it is remembered here; later encounters of the same
//! probe run under a much smaller budget. The registry itself is bounded:
//! when full, the oldest entry is evicted in insertion order.

use ahash::AHashSet;
use bibdedup_formats::KeyField;
use std::collections::VecDeque;

/// Candidate budget for a probe not seen overloading before
pub const DEFAULT_PROBE_LIMIT: usize = 1_000;

/// Candidate budget for a probe that has tripped the guard before
pub const TRIPPED_PROBE_LIMIT: usize = 100;

/// Maximum number of remembered overloaded probes
pub const REGISTRY_CAPACITY: usize = 2_000;

/// One `(index, key)` candidate probe
pub type Probe = (KeyField, String);

/// Bounded memory of probes that produced too many candidates
pub struct ProbeOverloadRegistry {
    tripped: AHashSet<Probe>,
    insertion_order: VecDeque<Probe>,
    capacity: usize,
}

impl ProbeOverloadRegistry {
    pub fn new() -> Self {
        Self::with_capacity(REGISTRY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tripped: AHashSet::with_capacity(capacity.min(REGISTRY_CAPACITY)),
            insertion_order: VecDeque::with_capacity(capacity.min(REGISTRY_CAPACITY)),
            capacity,
        }
    }

    /// Candidate budget currently in force for a probe
    pub fn limit_for(&self, field: KeyField, key: &str) -> usize {
        if self.tripped.contains(&(field, key.to_string())) {
            TRIPPED_PROBE_LIMIT
        } else {
            DEFAULT_PROBE_LIMIT
        }
    }

    /// Remember that a probe tripped its budget
    pub fn record_trip(&mut self, field: KeyField, key: &str) {
        let probe = (field, key.to_string());
        if self.tripped.contains(&probe) {
            return;
        }
        if self.tripped.len() >= self.capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.tripped.remove(&oldest);
            }
        }
        self.tripped.insert(probe.clone());
        self.insertion_order.push_back(probe);
    }

    /// Number of remembered probes
    pub fn len(&self) -> usize {
        self.tripped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tripped.is_empty()
    }
}

impl Default for ProbeOverloadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limit() {
        let registry = ProbeOverloadRegistry::new();
        assert_eq!(
            registry.limit_for(KeyField::Title, "popular"),
            DEFAULT_PROBE_LIMIT
        );
    }

    #[test]
    fn test_tripped_limit() {
        let mut registry = ProbeOverloadRegistry::new();
        registry.record_trip(KeyField::Title, "popular");
        assert_eq!(
            registry.limit_for(KeyField::Title, "popular"),
            TRIPPED_PROBE_LIMIT
        );
        // Same key on another index is a different probe
        assert_eq!(
            registry.limit_for(KeyField::Isbn, "popular"),
            DEFAULT_PROBE_LIMIT
        );
    }

    #[test]
    fn test_insertion_order_eviction() {
        let mut registry = ProbeOverloadRegistry::with_capacity(2);
        registry.record_trip(KeyField::Title, "a");
        registry.record_trip(KeyField::Title, "b");
        registry.record_trip(KeyField::Title, "c");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.limit_for(KeyField::Title, "a"), DEFAULT_PROBE_LIMIT);
        assert_eq!(registry.limit_for(KeyField::Title, "b"), TRIPPED_PROBE_LIMIT);
        assert_eq!(registry.limit_for(KeyField::Title, "c"), TRIPPED_PROBE_LIMIT);
    }

    #[test]
    fn test_repeat_trip_keeps_position() {
        let mut registry = ProbeOverloadRegistry::with_capacity(2);
        registry.record_trip(KeyField::Title, "a");
        registry.record_trip(KeyField::Title, "b");
        registry.record_trip(KeyField::Title, "a");
        registry.record_trip(KeyField::Title, "c");

        // "a" kept its original insertion slot, so it was the eviction
        // victim despite the repeat trip
        assert_eq!(registry.limit_for(KeyField::Title, "a"), DEFAULT_PROBE_LIMIT);
        assert_eq!(registry.limit_for(KeyField::Title, "b"), TRIPPED_PROBE_LIMIT);
    }
}
