//! Shard progress ledger
//!
//! One bit per shard for "finished here" and one for "claimed by another
//! worker", so a run can prove at the end that every shard was accounted for.

use bitvec::prelude::*;

use crate::shard::ShardId;

/// Completion bitmap over shard ids.
#[derive(Debug, Clone)]
pub struct ShardLedger {
    completed: BitVec,
    skipped: BitVec,
}

impl ShardLedger {
    /// Ledger for shard ids `0..num_shards`.
    pub fn new(num_shards: usize) -> Self {
        Self {
            completed: bitvec![0; num_shards],
            skipped: bitvec![0; num_shards],
        }
    }

    /// Number of tracked shards.
    pub fn len(&self) -> usize {
        self.completed.len()
    }

    /// Whether no shard is tracked.
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    fn grow_to(&mut self, id: ShardId) {
        if id >= self.completed.len() {
            self.completed.resize(id + 1, false);
            self.skipped.resize(id + 1, false);
        }
    }

    /// Record that `id` was processed here.
    pub fn mark_complete(&mut self, id: ShardId) {
        self.grow_to(id);
        self.completed.set(id, true);
    }

    /// Record that `id` belongs to another worker.
    pub fn mark_skipped(&mut self, id: ShardId) {
        self.grow_to(id);
        self.skipped.set(id, true);
    }

    /// Whether `id` was processed here.
    pub fn is_complete(&self, id: ShardId) -> bool {
        self.completed.get(id).is_some_and(|bit| *bit)
    }

    /// Whether `id` was left to another worker.
    pub fn is_skipped(&self, id: ShardId) -> bool {
        self.skipped.get(id).is_some_and(|bit| *bit)
    }

    /// Shards processed here.
    pub fn completed_count(&self) -> usize {
        self.completed.count_ones()
    }

    /// Shards left to other workers.
    pub fn skipped_count(&self) -> usize {
        self.skipped.count_ones()
    }

    /// Shards neither processed nor skipped.
    pub fn missing(&self) -> Vec<ShardId> {
        (0..self.len())
            .filter(|&id| !self.completed[id] && !self.skipped[id])
            .collect()
    }

    /// Whether every shard was processed or skipped.
    pub fn all_accounted_for(&self) -> bool {
        self.completed
            .iter()
            .zip(self.skipped.iter())
            .all(|(done, skipped)| *done || *skipped)
    }
}
