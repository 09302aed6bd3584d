use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt;
use std::sync::Arc;

use super::Downsampler;

type Protect<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Levels a collection of groups down to a target total.
///
/// While the total exceeds the target, one item is removed from the largest
/// group (ties go to the group submitted first, i.e. the lowest key). A
/// non-empty group never drops below one item unless the target is zero, and
/// protected items (pre-aggregated records) are never removed. Inside a group
/// the survivors are taken at evenly spaced positions, so the result is fully
/// deterministic.
pub struct LevelingDownsampler<E> {
    target: usize,
    protect: Option<Protect<E>>,
    pending: Vec<Vec<E>>,
    finalized: Vec<Vec<E>>,
    discarded: u64,
}

impl<E> fmt::Debug for LevelingDownsampler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelingDownsampler")
            .field("target", &self.target)
            .field("protected", &self.protect.is_some())
            .field("pending_groups", &self.pending.len())
            .field("finalized_groups", &self.finalized.len())
            .field("discarded", &self.discarded)
            .finish()
    }
}

impl<E> LevelingDownsampler<E> {
    /// Downsampler keeping at most `target` items in total.
    pub fn new(target: usize) -> Self {
        Self {
            target,
            protect: None,
            pending: Vec::new(),
            finalized: Vec::new(),
            discarded: 0,
        }
    }

    /// Never remove items for which `protect` returns true.
    pub fn with_protected<F>(mut self, protect: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.protect = Some(Arc::new(protect));
        self
    }

    /// Target total size.
    pub fn target(&self) -> usize {
        self.target
    }

    fn is_protected(&self, item: &E) -> bool {
        self.protect.as_ref().is_some_and(|protect| protect(item))
    }

    /// Level keyed groups in place; ties are broken by lowest key.
    /// Returns the number of items removed by this call.
    pub fn level_map<K: Ord>(&mut self, groups: &mut BTreeMap<K, Vec<E>>) -> usize {
        let mut slots: Vec<&mut Vec<E>> = groups.values_mut().collect();
        self.level_slots(&mut slots)
    }

    /// Level groups in place; ties are broken by lowest index.
    /// Returns the number of items removed by this call.
    pub fn level(&mut self, groups: &mut [Vec<E>]) -> usize {
        let mut slots: Vec<&mut Vec<E>> = groups.iter_mut().collect();
        self.level_slots(&mut slots)
    }

    fn level_slots(&mut self, groups: &mut [&mut Vec<E>]) -> usize {
        let total: usize = groups.iter().map(|group| group.len()).sum();
        if total <= self.target {
            return 0;
        }

        let floors: Vec<usize> = groups
            .iter()
            .map(|group| {
                let protected = group.iter().filter(|item| self.is_protected(item)).count();
                let keep_one = usize::from(self.target > 0 && !group.is_empty());
                protected.max(keep_one)
            })
            .collect();
        let removals = removal_plan(groups, &floors, total - self.target);

        let mut removed = 0;
        for (group, count) in groups.iter_mut().zip(removals) {
            if count > 0 {
                removed += self.thin_group(group, count);
            }
        }
        self.discarded += removed as u64;
        removed
    }

    // Drop `count` unprotected items, keeping the survivors evenly spaced.
    fn thin_group(&self, group: &mut Vec<E>, count: usize) -> usize {
        let removable: Vec<usize> = group
            .iter()
            .enumerate()
            .filter(|(_, item)| !self.is_protected(item))
            .map(|(idx, _)| idx)
            .collect();
        let count = count.min(removable.len());
        let survivors = removable.len() - count;

        let mut discard = vec![false; group.len()];
        for &idx in &removable {
            discard[idx] = true;
        }
        for j in 0..survivors {
            discard[removable[j * removable.len() / survivors]] = false;
        }

        let mut flags = discard.into_iter();
        group.retain(|_| !flags.next().unwrap_or(false));
        count
    }
}

/// How many items to remove from each group.
fn removal_plan<E>(groups: &[&mut Vec<E>], floors: &[usize], excess: usize) -> Vec<usize> {
    let mut sizes: Vec<usize> = groups.iter().map(|group| group.len()).collect();
    let mut heap: BinaryHeap<(usize, Reverse<usize>)> = sizes
        .iter()
        .enumerate()
        .filter(|&(idx, &size)| size > floors[idx])
        .map(|(idx, &size)| (size, Reverse(idx)))
        .collect();

    let mut remaining = excess;
    while remaining > 0 {
        let Some((size, Reverse(idx))) = heap.pop() else {
            break;
        };
        sizes[idx] = size - 1;
        remaining -= 1;
        if sizes[idx] > floors[idx] {
            heap.push((sizes[idx], Reverse(idx)));
        }
    }

    groups
        .iter()
        .zip(sizes)
        .map(|(group, size)| group.len() - size)
        .collect()
}

impl<E> Downsampler<Vec<E>> for LevelingDownsampler<E> {
    fn submit(&mut self, group: Vec<E>) {
        self.pending.push(group);
    }

    fn has_finalized_items(&self) -> bool {
        !self.finalized.is_empty()
    }

    fn consume_finalized_items(&mut self) -> Vec<Vec<E>> {
        std::mem::take(&mut self.finalized)
    }

    fn has_pending_items(&self) -> bool {
        !self.pending.is_empty()
    }

    fn signal_end_of_input(&mut self) {
        let mut groups = std::mem::take(&mut self.pending);
        self.level(&mut groups);
        self.finalized.extend(groups);
    }

    fn discarded(&self) -> u64 {
        self.discarded
    }

    fn reset_stats(&mut self) {
        self.discarded = 0;
    }

    fn clear(&mut self) {
        self.pending.clear();
        self.finalized.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(groups: &[Vec<u32>]) -> Vec<usize> {
        groups.iter().map(Vec::len).collect()
    }

    #[test]
    fn equal_groups_level_evenly() {
        let mut groups: Vec<Vec<u32>> = (0..3).map(|_| (0..100).collect()).collect();
        let mut ds = LevelingDownsampler::new(150);
        assert_eq!(ds.level(&mut groups), 150);
        assert_eq!(sizes(&groups), vec![50, 50, 50]);
        assert_eq!(ds.discarded(), 150);
    }

    #[test]
    fn largest_group_is_trimmed_first() {
        let mut groups: Vec<Vec<u32>> =
            vec![(0..10).collect(), (0..2).collect(), (0..40).collect()];
        let mut ds = LevelingDownsampler::new(20);
        ds.level(&mut groups);
        assert_eq!(sizes(&groups), vec![9, 2, 9]);
    }

    #[test]
    fn ties_go_to_lowest_key() {
        let mut groups: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
        groups.insert("b", (0..5).collect());
        groups.insert("a", (0..5).collect());
        let mut ds = LevelingDownsampler::new(9);
        ds.level_map(&mut groups);
        assert_eq!(groups["a"].len(), 4);
        assert_eq!(groups["b"].len(), 5);
    }

    #[test]
    fn non_empty_groups_keep_one_item() {
        let mut groups: Vec<Vec<u32>> =
            vec![(0..5).collect(), (0..5).collect(), vec![], (0..5).collect()];
        let mut ds = LevelingDownsampler::new(1);
        ds.level(&mut groups);
        assert_eq!(sizes(&groups), vec![1, 1, 0, 1]);
        assert_eq!(ds.discarded(), 12);
    }

    #[test]
    fn zero_target_empties_everything() {
        let mut groups: Vec<Vec<u32>> = vec![(0..5).collect(), (0..3).collect()];
        let mut ds = LevelingDownsampler::new(0);
        ds.level(&mut groups);
        assert_eq!(sizes(&groups), vec![0, 0]);
    }

    #[test]
    fn no_groups_is_a_no_op() {
        let mut groups: Vec<Vec<u32>> = Vec::new();
        let mut ds = LevelingDownsampler::new(0);
        assert_eq!(ds.level(&mut groups), 0);
        assert!(groups.is_empty());
    }

    #[test]
    fn survivors_are_evenly_spaced() {
        let mut groups: Vec<Vec<u32>> = vec![(0..10).collect()];
        let mut ds = LevelingDownsampler::new(5);
        ds.level(&mut groups);
        assert_eq!(groups[0], vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn protected_items_are_never_dropped() {
        let mut groups: Vec<Vec<u32>> = vec![(0..20).collect(), (0..4).collect()];
        let mut ds = LevelingDownsampler::new(2).with_protected(|item: &u32| *item % 5 == 0);
        ds.level(&mut groups);
        assert_eq!(groups[0], vec![0, 5, 10, 15]);
        assert_eq!(groups[1], vec![0]);
    }

    #[test]
    fn reset_stats_keeps_leveled_data() {
        let mut ds = LevelingDownsampler::new(4);
        ds.submit((0..6).collect::<Vec<u32>>());
        ds.submit((0..6).collect::<Vec<u32>>());
        assert!(ds.has_pending_items());
        ds.signal_end_of_input();
        assert_eq!(ds.discarded(), 8);
        ds.reset_stats();
        assert_eq!(ds.discarded(), 0);
        let groups = ds.consume_finalized_items();
        assert_eq!(sizes(&groups), vec![2, 2]);
    }
}
