use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use super::{GenomeLoc, IntervalError};

/// Named contig with its (optional) length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigRecord {
    /// Contig name as it appears in read records.
    pub name: Arc<str>,
    /// Contig length in bases, when known.
    pub length: Option<u64>,
}

/// Ranking of contigs used for every interval comparison in a run.
///
/// Built once at startup and shared by `Arc`. Contigs absent from the table
/// sort after every ranked contig and compare lexicographically among
/// themselves, so an empty table degrades to plain name ordering.
#[derive(Debug, Clone, Default)]
pub struct ContigOrder {
    records: Vec<ContigRecord>,
    ranks: HashMap<Arc<str>, usize>,
}

impl ContigOrder {
    /// Table with no ranked contigs (lexicographic ordering).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rank contigs in the given order, lengths unknown.
    pub fn from_names<I, S>(names: I) -> Result<Self, IntervalError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self::from_records(names.into_iter().map(|name| ContigRecord {
            name: name.into(),
            length: None,
        }))
    }

    /// Rank contigs from a `(name, length)` sequence dictionary.
    pub fn from_dictionary<I, S>(entries: I) -> Result<Self, IntervalError>
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<Arc<str>>,
    {
        Self::from_records(entries.into_iter().map(|(name, length)| ContigRecord {
            name: name.into(),
            length: Some(length),
        }))
    }

    fn from_records<I>(records: I) -> Result<Self, IntervalError>
    where
        I: IntoIterator<Item = ContigRecord>,
    {
        let mut order = Self::default();
        for record in records {
            if record.name.is_empty() {
                return Err(IntervalError::EmptyContig(String::new()));
            }
            if order.ranks.contains_key(&record.name) {
                return Err(IntervalError::DuplicateContig(record.name.to_string()));
            }
            order
                .ranks
                .insert(Arc::clone(&record.name), order.records.len());
            order.records.push(record);
        }
        Ok(order)
    }

    /// Number of ranked contigs.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no contig is ranked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ranked contigs in rank order.
    pub fn records(&self) -> &[ContigRecord] {
        &self.records
    }

    /// Rank of `contig`, if present.
    pub fn rank(&self, contig: &str) -> Option<usize> {
        self.ranks.get(contig).copied()
    }

    /// Whether `contig` is ranked.
    pub fn contains(&self, contig: &str) -> bool {
        self.ranks.contains_key(contig)
    }

    /// Dictionary length of `contig`, if known.
    pub fn length(&self, contig: &str) -> Option<u64> {
        self.rank(contig).and_then(|idx| self.records[idx].length)
    }

    /// Shared name for `contig`, reusing the dictionary allocation when ranked.
    pub fn intern(&self, contig: &str) -> Arc<str> {
        match self.rank(contig) {
            Some(idx) => Arc::clone(&self.records[idx].name),
            None => Arc::from(contig),
        }
    }

    /// Compare two contig names.
    pub fn compare_contigs(&self, lhs: &str, rhs: &str) -> Ordering {
        if lhs == rhs {
            return Ordering::Equal;
        }
        match (self.rank(lhs), self.rank(rhs)) {
            (Some(l), Some(r)) => l.cmp(&r),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => lhs.cmp(rhs),
        }
    }

    /// Compare two intervals: contig rank, then start, then stop.
    pub fn compare(&self, lhs: &GenomeLoc, rhs: &GenomeLoc) -> Ordering {
        self.compare_contigs(lhs.contig(), rhs.contig())
            .then_with(|| lhs.start().cmp(&rhs.start()))
            .then_with(|| lhs.stop().cmp(&rhs.stop()))
    }

    /// Sort intervals in place.
    pub fn sort(&self, locs: &mut [GenomeLoc]) {
        locs.sort_by(|a, b| self.compare(a, b));
    }

    /// Whether `locs` is already in non-decreasing order.
    pub fn is_sorted(&self, locs: &[GenomeLoc]) -> bool {
        locs.windows(2)
            .all(|pair| self.compare(&pair[0], &pair[1]) != Ordering::Greater)
    }
}

/// Optional-table comparison: `None` behaves like an empty table.
pub(crate) fn compare_with(
    order: Option<&ContigOrder>,
    lhs: &GenomeLoc,
    rhs: &GenomeLoc,
) -> Ordering {
    match order {
        Some(order) => order.compare(lhs, rhs),
        None => ContigOrder::empty().compare(lhs, rhs),
    }
}
