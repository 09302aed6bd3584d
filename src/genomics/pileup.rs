use std::sync::Arc;

use crate::genomics::{AlignedRead, Alignment, CigarOpKind};
use crate::interval::GenomeLoc;

const NUM_BASES: usize = 4; // A, C, G, T

fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' | b'U' | b'u' => Some(3),
        _ => None,
    }
}

/// One read's contribution to a locus.
#[derive(Debug)]
pub struct PileupElement<R> {
    /// The covering read.
    pub read: Arc<R>,
    /// Read offset at this locus; for deletions the last base before the gap.
    pub offset: usize,
    /// Operation covering the locus (`Match`, `Deletion` or `Skip`).
    pub op: CigarOpKind,
    /// An insertion follows this base.
    pub before_insertion: bool,
    /// An insertion precedes this base.
    pub after_insertion: bool,
    /// A deletion follows this base.
    pub before_deletion: bool,
    /// A deletion precedes this base.
    pub after_deletion: bool,
}

impl<R> Clone for PileupElement<R> {
    fn clone(&self) -> Self {
        Self {
            read: Arc::clone(&self.read),
            offset: self.offset,
            op: self.op,
            before_insertion: self.before_insertion,
            after_insertion: self.after_insertion,
            before_deletion: self.before_deletion,
            after_deletion: self.after_deletion,
        }
    }
}

impl<R> PileupElement<R> {
    /// Whether the read has a deletion at this locus.
    pub fn is_deletion(&self) -> bool {
        self.op == CigarOpKind::Deletion
    }

    /// Whether the read skips this locus (`N`).
    pub fn is_skip(&self) -> bool {
        self.op == CigarOpKind::Skip
    }
}

/// Pileup at a single reference position.
#[derive(Debug)]
pub struct LocusView<R> {
    /// Single-base locus.
    pub locus: GenomeLoc,
    /// Covering reads in admission order.
    pub elements: Vec<PileupElement<R>>,
}

impl<R> Clone for LocusView<R> {
    fn clone(&self) -> Self {
        Self {
            locus: self.locus.clone(),
            elements: self.elements.clone(),
        }
    }
}

impl<R> LocusView<R> {
    /// Reference position (1-based).
    pub fn position(&self) -> u64 {
        self.locus.start()
    }

    /// Contig of the locus.
    pub fn contig(&self) -> &str {
        self.locus.contig()
    }

    /// Number of covering reads.
    pub fn depth(&self) -> usize {
        self.elements.len()
    }

    /// Whether no read covers the locus.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Covering reads.
    pub fn reads(&self) -> impl Iterator<Item = &Arc<R>> {
        self.elements.iter().map(|element| &element.read)
    }

    /// Elements that place a read base on this locus.
    pub fn aligned_bases(&self) -> impl Iterator<Item = &PileupElement<R>> {
        self.elements
            .iter()
            .filter(|element| element.op == CigarOpKind::Match)
    }

    /// Number of reads with a deletion here.
    pub fn deletion_count(&self) -> usize {
        self.elements.iter().filter(|e| e.is_deletion()).count()
    }
}

impl<R: Alignment> LocusView<R> {
    /// Number of covering records flagged as reduced.
    pub fn reduced_count(&self) -> usize {
        self.reads().filter(|read| read.is_reduced()).count()
    }
}

impl LocusView<AlignedRead> {
    /// Per-base observation counts for this locus.
    pub fn base_counts(&self) -> BaseCounts {
        let mut counts = BaseCounts::new(self.position());
        for element in self.aligned_bases() {
            if let Some(idx) = element.read.base_at(element.offset).and_then(base_index) {
                let qual = element.read.quality_at(element.offset).unwrap_or(30);
                counts.observe(idx, qual);
            }
        }
        counts.deletions = self.deletion_count() as u32;
        counts
    }
}

/// Aggregated base statistics for a genomic position.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseCounts {
    /// Genomic coordinate (1-based) of the pileup position.
    pub position: u64,
    /// Per-base observation counts [A, C, G, T].
    pub base_counts: [u32; NUM_BASES],
    /// Sum of normalised quality scores per base.
    pub quality_sums: [f32; NUM_BASES],
    /// Reads contributing an A/C/G/T base.
    pub depth: u32,
    /// Reads with a deletion at the position.
    pub deletions: u32,
}

impl BaseCounts {
    /// Empty counts for `position`.
    pub fn new(position: u64) -> Self {
        Self {
            position,
            base_counts: [0; NUM_BASES],
            quality_sums: [0.0; NUM_BASES],
            depth: 0,
            deletions: 0,
        }
    }

    pub(crate) fn observe(&mut self, base_idx: usize, quality: u8) {
        self.base_counts[base_idx] += 1;
        self.quality_sums[base_idx] += (quality as f32) / 93.0; // Normalize to [0,1]
        self.depth += 1;
    }

    /// Sum counts observed for the same position.
    pub fn merge(&self, other: &Self) -> Self {
        debug_assert_eq!(self.position, other.position);
        let mut merged = Self::new(self.position);
        for i in 0..NUM_BASES {
            merged.base_counts[i] = self.base_counts[i] + other.base_counts[i];
            merged.quality_sums[i] = self.quality_sums[i] + other.quality_sums[i];
        }
        merged.depth = self.depth + other.depth;
        merged.deletions = self.deletions + other.deletions;
        merged
    }

    /// Count for an ASCII base.
    pub fn count(&self, base: u8) -> u32 {
        base_index(base).map_or(0, |idx| self.base_counts[idx])
    }
}
