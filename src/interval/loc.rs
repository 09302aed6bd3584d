//! Closed 1-based genomic interval.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::contig_order::compare_with;
use super::{ContigOrder, IntervalError};

/// Stop sentinel meaning "through the end of the contig".
pub const END_OF_CONTIG: u64 = u64::MAX;

/// Interval `[start, stop]` on a contig, 1-based and inclusive.
///
/// Equality and hashing use contig, start and stop. Ordering needs a
/// [`ContigOrder`], so `GenomeLoc` deliberately does not implement `Ord`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenomeLoc {
    contig: Arc<str>,
    start: u64,
    stop: u64,
}

impl GenomeLoc {
    /// Construct a validated interval.
    pub fn new(contig: impl Into<Arc<str>>, start: u64, stop: u64) -> Result<Self, IntervalError> {
        let contig = contig.into();
        if contig.is_empty() {
            return Err(IntervalError::EmptyContig(format!("{start}-{stop}")));
        }
        if start == 0 {
            return Err(IntervalError::StartBelowOne {
                contig: contig.to_string(),
                start,
            });
        }
        if start > stop {
            return Err(IntervalError::StartAfterStop {
                contig: contig.to_string(),
                start,
                stop,
            });
        }
        Ok(Self { contig, start, stop })
    }

    // Caller guarantees a non-empty contig and 1 <= start <= stop.
    pub(crate) fn from_parts(contig: Arc<str>, start: u64, stop: u64) -> Self {
        debug_assert!(!contig.is_empty() && start >= 1 && start <= stop);
        Self { contig, start, stop }
    }

    /// Single-base interval.
    pub fn position(contig: impl Into<Arc<str>>, pos: u64) -> Result<Self, IntervalError> {
        Self::new(contig, pos, pos)
    }

    /// Whole contig, `[1, END_OF_CONTIG]`.
    pub fn whole_contig(contig: impl Into<Arc<str>>) -> Result<Self, IntervalError> {
        Self::new(contig, 1, END_OF_CONTIG)
    }

    /// Contig name.
    pub fn contig(&self) -> &str {
        &self.contig
    }

    /// Shared contig name.
    pub fn contig_arc(&self) -> &Arc<str> {
        &self.contig
    }

    /// First base (1-based).
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last base (inclusive).
    pub fn stop(&self) -> u64 {
        self.stop
    }

    /// Number of bases covered.
    pub fn size(&self) -> u64 {
        self.stop - self.start + 1
    }

    /// Whether the interval covers exactly one base.
    pub fn is_single_base(&self) -> bool {
        self.start == self.stop
    }

    /// Whether the interval is open-ended at the stop.
    pub fn is_open_ended(&self) -> bool {
        self.stop == END_OF_CONTIG
    }

    /// Whether the interval is `[1, END_OF_CONTIG]`.
    pub fn is_whole_contig(&self) -> bool {
        self.start == 1 && self.stop == END_OF_CONTIG
    }

    /// Same interval with a new start.
    pub fn with_start(&self, start: u64) -> Result<Self, IntervalError> {
        Self::new(Arc::clone(&self.contig), start, self.stop)
    }

    /// Same interval with a new stop.
    pub fn with_stop(&self, stop: u64) -> Result<Self, IntervalError> {
        Self::new(Arc::clone(&self.contig), self.start, stop)
    }

    /// Translate by `by` bases. An open-ended stop stays open-ended.
    pub fn shift(&self, by: i64) -> Result<Self, IntervalError> {
        let out_of_range = || IntervalError::ShiftOutOfRange {
            loc: self.to_string(),
            by,
        };
        let start = self.start.checked_add_signed(by).ok_or_else(out_of_range)?;
        let stop = if self.is_open_ended() {
            END_OF_CONTIG
        } else {
            self.stop
                .checked_add_signed(by)
                .filter(|&stop| stop != END_OF_CONTIG)
                .ok_or_else(out_of_range)?
        };
        if start == 0 {
            return Err(out_of_range());
        }
        Self::new(Arc::clone(&self.contig), start, stop)
    }

    /// Whether both intervals lie on one contig.
    pub fn on_same_contig(&self, other: &Self) -> bool {
        self.contig == other.contig
    }

    /// Whether the intervals share at least one base.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.on_same_contig(other) && self.start <= other.stop && other.start <= self.stop
    }

    /// Negation of [`overlaps`](Self::overlaps).
    pub fn disjoint(&self, other: &Self) -> bool {
        !self.overlaps(other)
    }

    /// Whether `other` lies entirely within this interval.
    pub fn contains(&self, other: &Self) -> bool {
        self.on_same_contig(other) && self.start <= other.start && other.stop <= self.stop
    }

    /// Whether `pos` on `contig` lies within this interval.
    pub fn contains_position(&self, contig: &str, pos: u64) -> bool {
        self.contig() == contig && self.start <= pos && pos <= self.stop
    }

    /// Distance between starts; `u64::MAX` across contigs.
    pub fn distance(&self, other: &Self) -> u64 {
        if self.on_same_contig(other) {
            self.start.abs_diff(other.start)
        } else {
            u64::MAX
        }
    }

    /// Gap between the closest endpoints: 0 when overlapping, 1 when
    /// adjacent, `u64::MAX` across contigs.
    pub fn min_distance(&self, other: &Self) -> u64 {
        if !self.on_same_contig(other) {
            u64::MAX
        } else if self.stop < other.start {
            other.start - self.stop
        } else if other.stop < self.start {
            self.start - other.stop
        } else {
            0
        }
    }

    /// Whether this interval ends before `other` begins.
    pub fn is_before(&self, other: &Self, order: &ContigOrder) -> bool {
        match order.compare_contigs(self.contig(), other.contig()) {
            Ordering::Less => true,
            Ordering::Equal => self.stop < other.start,
            Ordering::Greater => false,
        }
    }

    /// Whether this interval begins after `other` ends.
    pub fn is_past(&self, other: &Self, order: &ContigOrder) -> bool {
        match order.compare_contigs(self.contig(), other.contig()) {
            Ordering::Greater => true,
            Ordering::Equal => self.start > other.stop,
            Ordering::Less => false,
        }
    }

    /// Compare with an optional contig table (`None` compares names).
    pub fn compare(&self, other: &Self, order: Option<&ContigOrder>) -> Ordering {
        compare_with(order, self, other)
    }

    fn require_same_contig(&self, other: &Self) -> Result<(), IntervalError> {
        if self.on_same_contig(other) {
            Ok(())
        } else {
            Err(IntervalError::DifferentContigs {
                lhs: self.to_string(),
                rhs: other.to_string(),
            })
        }
    }

    /// Union of two overlapping or adjacent intervals.
    pub fn merge(&self, other: &Self) -> Result<Self, IntervalError> {
        self.require_same_contig(other)?;
        let touching = self.start <= other.stop.saturating_add(1)
            && other.start <= self.stop.saturating_add(1);
        if !touching {
            return Err(IntervalError::NotContiguous {
                lhs: self.to_string(),
                rhs: other.to_string(),
            });
        }
        self.span_with(other)
    }

    /// Smallest interval covering both, gaps included.
    pub fn span_with(&self, other: &Self) -> Result<Self, IntervalError> {
        self.require_same_contig(other)?;
        Self::new(
            Arc::clone(&self.contig),
            self.start.min(other.start),
            self.stop.max(other.stop),
        )
    }

    /// Shared bases, or `None` when disjoint.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Self {
            contig: Arc::clone(&self.contig),
            start: self.start.max(other.start),
            stop: self.stop.min(other.stop),
        })
    }

    /// Bases of `self` not covered by `other` (zero, one or two pieces).
    pub fn subtract(&self, other: &Self) -> Vec<Self> {
        if !self.overlaps(other) {
            return vec![self.clone()];
        }
        let mut pieces = Vec::with_capacity(2);
        if self.start < other.start {
            pieces.push(Self {
                contig: Arc::clone(&self.contig),
                start: self.start,
                stop: other.start - 1,
            });
        }
        if other.stop < self.stop {
            pieces.push(Self {
                contig: Arc::clone(&self.contig),
                start: other.stop + 1,
                stop: self.stop,
            });
        }
        pieces
    }

    /// First base as a single-base interval.
    pub fn start_loc(&self) -> Self {
        Self {
            contig: Arc::clone(&self.contig),
            start: self.start,
            stop: self.start,
        }
    }

    /// Last base as a single-base interval.
    pub fn stop_loc(&self) -> Self {
        Self {
            contig: Arc::clone(&self.contig),
            start: self.stop,
            stop: self.stop,
        }
    }
}

impl fmt::Display for GenomeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole_contig() {
            write!(f, "{}", self.contig)
        } else if self.is_open_ended() {
            write!(f, "{}:{}+", self.contig, self.start)
        } else if self.is_single_base() {
            write!(f, "{}:{}", self.contig, self.start)
        } else {
            write!(f, "{}:{}-{}", self.contig, self.start, self.stop)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(contig: &str, start: u64, stop: u64) -> GenomeLoc {
        GenomeLoc::new(contig, start, stop).unwrap()
    }

    #[test]
    fn construction_rejects_bad_bounds() {
        assert!(matches!(
            GenomeLoc::new("chr1", 10, 5),
            Err(IntervalError::StartAfterStop { .. })
        ));
        assert!(matches!(
            GenomeLoc::new("chr1", 0, 5),
            Err(IntervalError::StartBelowOne { .. })
        ));
        assert!(GenomeLoc::new("", 1, 5).is_err());
    }

    #[test]
    fn overlap_and_distance() {
        let a = loc("chr1", 10, 20);
        let b = loc("chr1", 20, 30);
        let c = loc("chr1", 25, 40);
        let d = loc("chr2", 10, 20);

        assert!(a.overlaps(&b));
        assert!(a.disjoint(&c));
        assert!(a.disjoint(&d));
        assert_eq!(a.distance(&c), 15);
        assert_eq!(a.distance(&d), u64::MAX);
        assert_eq!(a.min_distance(&b), 0);
        assert_eq!(a.min_distance(&c), 5);
    }

    #[test]
    fn merge_requires_contiguity() {
        let a = loc("chr1", 10, 20);
        assert_eq!(a.merge(&loc("chr1", 21, 25)).unwrap(), loc("chr1", 10, 25));
        assert!(matches!(
            a.merge(&loc("chr1", 22, 25)),
            Err(IntervalError::NotContiguous { .. })
        ));
        assert!(matches!(
            a.merge(&loc("chr2", 10, 20)),
            Err(IntervalError::DifferentContigs { .. })
        ));
    }

    #[test]
    fn subtract_splits_around_hole() {
        let a = loc("chr1", 1, 100);
        let pieces = a.subtract(&loc("chr1", 40, 60));
        assert_eq!(pieces, vec![loc("chr1", 1, 39), loc("chr1", 61, 100)]);
        assert!(a.subtract(&a).is_empty());
    }

    #[test]
    fn shift_keeps_open_end() {
        let open = loc("chr1", 5, END_OF_CONTIG);
        let shifted = open.shift(10).unwrap();
        assert_eq!(shifted.start(), 15);
        assert!(shifted.is_open_ended());
        assert!(loc("chr1", 5, 9).shift(-5).is_err());
        assert_eq!(loc("chr1", 5, 9).shift(-4).unwrap(), loc("chr1", 1, 5));
    }

    #[test]
    fn before_and_past_use_contig_order() {
        let order = ContigOrder::from_names(["chr2", "chr1"]).unwrap();
        let on_two = loc("chr2", 500, 600);
        let on_one = loc("chr1", 1, 10);
        assert!(on_two.is_before(&on_one, &order));
        assert!(on_one.is_past(&on_two, &order));
    }

    #[test]
    fn display_forms() {
        assert_eq!(loc("chr1", 5, 5).to_string(), "chr1:5");
        assert_eq!(loc("chr1", 5, 9).to_string(), "chr1:5-9");
        assert_eq!(GenomeLoc::whole_contig("chrX").unwrap().to_string(), "chrX");
        assert_eq!(loc("chr1", 5, END_OF_CONTIG).to_string(), "chr1:5+");
    }
}
