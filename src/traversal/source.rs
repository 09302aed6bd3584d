use std::collections::HashMap;
use std::ops::Range;

use thiserror::Error;

use crate::genomics::Alignment;
use crate::interval::{ContigOrder, GenomeLoc};
use crate::shard::Shard;

/// Boxed read stream handed to a window.
pub type ReadIter<'a, R> = Box<dyn Iterator<Item = R> + Send + 'a>;

/// Read source failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Reads for an interval could not be produced.
    #[error("cannot read alignments for {loc}: {message}")]
    Unreadable {
        /// Requested interval.
        loc: String,
        /// Failure description.
        message: String,
    },

    /// Source records are not sorted.
    #[error("read source is not sorted by contig rank and start")]
    Unsorted,
}

/// Whether `read` covers any base of `loc`.
pub fn read_overlaps<R: Alignment + ?Sized>(read: &R, loc: &GenomeLoc) -> bool {
    read.contig() == loc.contig()
        && read.alignment_start() <= loc.stop()
        && read.alignment_end() >= loc.start()
}

/// Provider of coordinate-sorted reads.
pub trait ReadSource: Send + Sync {
    /// Read record type.
    type Read: Alignment + Send + Sync + 'static;

    /// Reads overlapping `loc`, sorted by start.
    fn reads_in<'a>(&'a self, loc: &GenomeLoc) -> Result<ReadIter<'a, Self::Read>, SourceError>;

    /// Reads overlapping any interval of `shard`, each yielded once.
    fn reads_for<'a>(&'a self, shard: &Shard) -> Result<ReadIter<'a, Self::Read>, SourceError> {
        let mut parts = Vec::with_capacity(shard.intervals().len());
        for (idx, loc) in shard.intervals().iter().enumerate() {
            let earlier = shard.intervals()[..idx].to_vec();
            let reads = self.reads_in(loc)?;
            parts.push(
                reads.filter(move |read| !earlier.iter().any(|prev| read_overlaps(read, prev))),
            );
        }
        Ok(Box::new(parts.into_iter().flatten()))
    }
}

/// Read source over an in-memory, sorted vector.
#[derive(Debug, Clone)]
pub struct InMemoryReadSource<R> {
    reads: Vec<R>,
    contigs: HashMap<String, ContigRun>,
}

// Slice of `reads` on one contig and the longest reference span among them.
#[derive(Debug, Clone)]
struct ContigRun {
    range: Range<usize>,
    max_span: u64,
}

fn index_contigs<R: Alignment>(reads: &[R]) -> HashMap<String, ContigRun> {
    let mut contigs: HashMap<String, ContigRun> = HashMap::new();
    for (idx, read) in reads.iter().enumerate() {
        let span = (read.alignment_end() + 1).saturating_sub(read.alignment_start());
        let run = contigs.entry(read.contig().to_string()).or_insert(ContigRun {
            range: idx..idx,
            max_span: 0,
        });
        run.range.end = idx + 1;
        run.max_span = run.max_span.max(span);
    }
    contigs
}

impl<R: Alignment> InMemoryReadSource<R> {
    /// Source over `reads`, which must be sorted by `order` and start.
    pub fn new(reads: Vec<R>, order: &ContigOrder) -> Result<Self, SourceError> {
        let sorted = reads.windows(2).all(|pair| {
            order
                .compare_contigs(pair[0].contig(), pair[1].contig())
                .then_with(|| pair[0].alignment_start().cmp(&pair[1].alignment_start()))
                .is_le()
        });
        if !sorted {
            return Err(SourceError::Unsorted);
        }
        let contigs = index_contigs(&reads);
        Ok(Self { reads, contigs })
    }

    /// Source over `reads` after sorting them by `order` and start.
    pub fn sorted(mut reads: Vec<R>, order: &ContigOrder) -> Self {
        reads.sort_by(|lhs, rhs| {
            order
                .compare_contigs(lhs.contig(), rhs.contig())
                .then_with(|| lhs.alignment_start().cmp(&rhs.alignment_start()))
        });
        let contigs = index_contigs(&reads);
        Self { reads, contigs }
    }

    /// Number of reads held.
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    /// Whether no reads are held.
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    /// All reads in order.
    pub fn reads(&self) -> &[R] {
        &self.reads
    }
}

impl<R> ReadSource for InMemoryReadSource<R>
where
    R: Alignment + Clone + Send + Sync + 'static,
{
    type Read = R;

    fn reads_in<'a>(&'a self, loc: &GenomeLoc) -> Result<ReadIter<'a, R>, SourceError> {
        let Some(run) = self.contigs.get(loc.contig()) else {
            return Ok(Box::new(std::iter::empty()));
        };
        // Reads starting before `loc.start - max_span` cannot reach the interval.
        let on_contig = &self.reads[run.range.clone()];
        let first = on_contig
            .partition_point(|read| read.alignment_start() + run.max_span <= loc.start());
        let last = on_contig.partition_point(|read| read.alignment_start() <= loc.stop());

        let loc = loc.clone();
        let iter = on_contig[first..last.max(first)]
            .iter()
            .filter(move |read| read_overlaps(*read, &loc))
            .cloned();
        Ok(Box::new(iter))
    }
}
