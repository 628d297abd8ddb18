// src/seen.rs
// Bounded, insertion-ordered set of project ids that were already surfaced.
// Entirely in-memory; the set does not survive a restart.

use std::collections::{HashSet, VecDeque};

use crate::kwork::types::Project;

/// Compaction kicks in once more than this many ids are tracked.
pub const MAX_TRACKED: usize = 1000;
/// After compaction only the most recently inserted ids remain.
pub const KEEP_AFTER_COMPACT: usize = 500;

#[derive(Debug, Default)]
pub struct SeenSet {
    ids: HashSet<String>,
    // Insertion order defines recency for compaction.
    order: VecDeque<String>,
    total_seen: u64,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Insert an id; returns `false` if it was already tracked.
    pub fn insert(&mut self, id: &str) -> bool {
        if !self.ids.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());
        self.total_seen += 1;
        true
    }

    /// Keep the unseen projects (input order preserved), marking each emitted
    /// id as seen. Compaction is a separate maintenance call on purpose.
    pub fn filter_new(&mut self, projects: Vec<Project>) -> Vec<Project> {
        projects
            .into_iter()
            .filter(|p| self.insert(&p.id))
            .collect()
    }

    /// Drop the oldest ids once the set outgrows [`MAX_TRACKED`], retaining
    /// the most recent [`KEEP_AFTER_COMPACT`]. Returns how many were dropped.
    pub fn compact(&mut self) -> usize {
        if self.order.len() <= MAX_TRACKED {
            return 0;
        }
        let mut dropped = 0;
        while self.order.len() > KEEP_AFTER_COMPACT {
            if let Some(old) = self.order.pop_front() {
                self.ids.remove(&old);
                dropped += 1;
            }
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Count of ids ever inserted, unaffected by compaction.
    pub fn total_seen(&self) -> u64 {
        self.total_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let mut s = SeenSet::new();
        assert!(s.insert("a"));
        assert!(!s.insert("a"));
        assert_eq!(s.len(), 1);
        assert_eq!(s.total_seen(), 1);
    }

    #[test]
    fn compact_is_a_noop_below_the_bound() {
        let mut s = SeenSet::new();
        for i in 0..MAX_TRACKED {
            s.insert(&i.to_string());
        }
        assert_eq!(s.compact(), 0);
        assert_eq!(s.len(), MAX_TRACKED);
    }
}
