use std::sync::Arc;

use super::{ContigOrder, GenomeLoc};

/// Sorted, non-overlapping collection of intervals.
///
/// Overlapping and adjacent inputs are merged on construction, so the set is
/// ready to be fed to the interval sharder as-is.
#[derive(Debug, Clone)]
pub struct GenomeLocSet {
    order: Arc<ContigOrder>,
    locs: Vec<GenomeLoc>,
}

impl GenomeLocSet {
    /// Build a set from arbitrary intervals.
    pub fn from_locs<I>(order: Arc<ContigOrder>, locs: I) -> Self
    where
        I: IntoIterator<Item = GenomeLoc>,
    {
        let mut sorted: Vec<GenomeLoc> = locs.into_iter().collect();
        order.sort(&mut sorted);

        let mut merged: Vec<GenomeLoc> = Vec::with_capacity(sorted.len());
        for loc in sorted {
            match merged.last_mut() {
                Some(last) => match last.merge(&loc) {
                    Ok(union) => *last = union,
                    Err(_) => merged.push(loc),
                },
                None => merged.push(loc),
            }
        }

        Self { order, locs: merged }
    }

    /// Contig ordering of the set.
    pub fn order(&self) -> &Arc<ContigOrder> {
        &self.order
    }

    /// Number of disjoint intervals.
    pub fn len(&self) -> usize {
        self.locs.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.locs.is_empty()
    }

    /// Intervals in order.
    pub fn iter(&self) -> std::slice::Iter<'_, GenomeLoc> {
        self.locs.iter()
    }

    /// Intervals as a slice.
    pub fn as_slice(&self) -> &[GenomeLoc] {
        &self.locs
    }

    /// Total bases covered (saturating for open-ended intervals).
    pub fn total_size(&self) -> u64 {
        self.locs
            .iter()
            .fold(0u64, |acc, loc| acc.saturating_add(loc.size()))
    }

    /// Whether any interval overlaps `loc`.
    pub fn overlaps(&self, loc: &GenomeLoc) -> bool {
        self.first_not_before(loc)
            .map(|idx| self.locs[idx].overlaps(loc))
            .unwrap_or(false)
    }

    /// Whether some interval fully contains `loc`.
    pub fn contains(&self, loc: &GenomeLoc) -> bool {
        self.first_not_before(loc)
            .map(|idx| self.locs[idx].contains(loc))
            .unwrap_or(false)
    }

    // Binary search for the first interval that does not end before `loc`.
    fn first_not_before(&self, loc: &GenomeLoc) -> Option<usize> {
        let idx = self
            .locs
            .partition_point(|candidate| candidate.is_before(loc, &self.order));
        (idx < self.locs.len()).then_some(idx)
    }

    /// Consume into the underlying vector.
    pub fn into_vec(self) -> Vec<GenomeLoc> {
        self.locs
    }
}

impl<'a> IntoIterator for &'a GenomeLocSet {
    type Item = &'a GenomeLoc;
    type IntoIter = std::slice::Iter<'a, GenomeLoc>;

    fn into_iter(self) -> Self::IntoIter {
        self.locs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(contig: &str, start: u64, stop: u64) -> GenomeLoc {
        GenomeLoc::new(contig, start, stop).unwrap()
    }

    #[test]
    fn merges_overlapping_and_adjacent() {
        let order = Arc::new(ContigOrder::from_names(["chr1", "chr2"]).unwrap());
        let set = GenomeLocSet::from_locs(
            order,
            vec![
                loc("chr2", 1, 10),
                loc("chr1", 50, 60),
                loc("chr1", 1, 10),
                loc("chr1", 11, 20),
                loc("chr1", 55, 70),
            ],
        );
        assert_eq!(
            set.as_slice(),
            &[loc("chr1", 1, 20), loc("chr1", 50, 70), loc("chr2", 1, 10)]
        );
        assert_eq!(set.total_size(), 20 + 21 + 10);
    }

    #[test]
    fn overlap_and_containment_queries() {
        let order = Arc::new(ContigOrder::from_names(["chr1", "chr2"]).unwrap());
        let set = GenomeLocSet::from_locs(order, vec![loc("chr1", 10, 20), loc("chr1", 40, 50)]);
        assert!(set.overlaps(&loc("chr1", 18, 42)));
        assert!(!set.overlaps(&loc("chr1", 21, 39)));
        assert!(set.contains(&loc("chr1", 41, 45)));
        assert!(!set.contains(&loc("chr1", 18, 42)));
        assert!(!set.overlaps(&loc("chr2", 10, 20)));
    }
}
