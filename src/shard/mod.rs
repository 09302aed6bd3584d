//! Work partitioning
//!
//! Splits the reference, or a sorted interval list, into shards of bounded
//! total size. Every base of the input lands in exactly one shard, shards never
//! cross a contig boundary, and shards are numbered in genome order so the
//! reduce stage can combine their results in sequence.

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::interval::{ContigOrder, GenomeLoc, IntervalError, END_OF_CONTIG};

/// Shard identifier: position of the shard in genome order.
pub type ShardId = usize;

/// Errors raised while sharding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardError {
    /// A maximum shard size of zero can never be satisfied.
    #[error("maximum shard size must be at least 1")]
    ZeroShardSize,

    /// The contig's length is needed but unknown.
    #[error("contig {contig} has no known length")]
    MissingLength {
        /// Contig name.
        contig: String,
    },

    /// Intervals are out of order.
    #[error("intervals are not sorted: {next} follows {previous}")]
    Unsorted {
        /// Preceding interval.
        previous: String,
        /// Offending interval.
        next: String,
    },

    /// Intervals overlap.
    #[error("intervals overlap: {previous} and {next}")]
    Overlapping {
        /// Preceding interval.
        previous: String,
        /// Offending interval.
        next: String,
    },

    /// Building a piece produced an invalid interval.
    #[error(transparent)]
    Interval(#[from] IntervalError),
}

/// Independent unit of work: one or more intervals on a single contig.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shard {
    id: ShardId,
    intervals: Vec<GenomeLoc>,
}

impl Shard {
    /// Shard from already validated, sorted intervals on one contig.
    pub fn new(id: ShardId, intervals: Vec<GenomeLoc>) -> Self {
        Self { id, intervals }
    }

    /// Sequential identifier.
    pub fn id(&self) -> ShardId {
        self.id
    }

    /// Intervals in genome order.
    pub fn intervals(&self) -> &[GenomeLoc] {
        &self.intervals
    }

    /// Contig every interval lies on.
    pub fn contig(&self) -> Option<&str> {
        self.intervals.first().map(GenomeLoc::contig)
    }

    /// Total bases covered.
    pub fn size(&self) -> u64 {
        self.intervals.iter().map(GenomeLoc::size).sum()
    }

    /// Interval from the first start to the last stop.
    pub fn span(&self) -> Option<GenomeLoc> {
        let first = self.intervals.first()?;
        let last = self.intervals.last()?;
        first.span_with(last).ok()
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard {} [", self.id)?;
        for (idx, loc) in self.intervals.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{loc}")?;
        }
        write!(f, "]")
    }
}

/// Partitions genomic territory into bounded shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sharder {
    max_size: u64,
}

impl Sharder {
    /// Sharder producing shards of at most `max_size` bases.
    pub fn new(max_size: u64) -> Result<Self, ShardError> {
        if max_size == 0 {
            return Err(ShardError::ZeroShardSize);
        }
        Ok(Self { max_size })
    }

    /// Maximum bases per shard.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Tile every contig of `order`; lengths must be known.
    pub fn shard_over_reference(&self, order: &ContigOrder) -> Result<Vec<Shard>, ShardError> {
        let mut contigs = Vec::with_capacity(order.len());
        for record in order.records() {
            let length = record.length.ok_or_else(|| ShardError::MissingLength {
                contig: record.name.to_string(),
            })?;
            if length > 0 {
                contigs.push(GenomeLoc::new(record.name.clone(), 1, length)?);
            }
        }
        self.shard_over_intervals(&contigs, order)
    }

    /// Shard a sorted, non-overlapping interval list.
    ///
    /// Oversized intervals are cut into leading pieces of exactly
    /// `max_size` plus a remainder. Consecutive pieces on one contig share a
    /// shard while the shard total stays within `max_size`.
    pub fn shard_over_intervals(
        &self,
        intervals: &[GenomeLoc],
        order: &ContigOrder,
    ) -> Result<Vec<Shard>, ShardError> {
        let resolved = resolve_open_ends(intervals, order)?;
        check_sorted(&resolved, order)?;

        let mut shards = Vec::new();
        let mut current: Vec<GenomeLoc> = Vec::new();
        let mut current_size = 0u64;

        for loc in &resolved {
            for piece in self.split(loc)? {
                let fits = current.first().is_some_and(|first| {
                    first.on_same_contig(&piece) && current_size + piece.size() <= self.max_size
                });
                if !fits && !current.is_empty() {
                    shards.push(Shard::new(shards.len(), std::mem::take(&mut current)));
                    current_size = 0;
                }
                current_size += piece.size();
                current.push(piece);
            }
        }
        if !current.is_empty() {
            shards.push(Shard::new(shards.len(), current));
        }

        debug!(
            intervals = intervals.len(),
            shards = shards.len(),
            max_size = self.max_size,
            "sharded intervals"
        );
        Ok(shards)
    }

    fn split(&self, loc: &GenomeLoc) -> Result<Vec<GenomeLoc>, ShardError> {
        let mut pieces = Vec::with_capacity(loc.size().div_ceil(self.max_size) as usize);
        let mut start = loc.start();
        while start <= loc.stop() {
            let stop = loc.stop().min(start.saturating_add(self.max_size - 1));
            pieces.push(GenomeLoc::new(loc.contig_arc().clone(), start, stop)?);
            if stop == loc.stop() {
                break;
            }
            start = stop + 1;
        }
        Ok(pieces)
    }
}

fn resolve_open_ends(
    intervals: &[GenomeLoc],
    order: &ContigOrder,
) -> Result<Vec<GenomeLoc>, ShardError> {
    intervals
        .iter()
        .map(|loc| {
            if loc.stop() != END_OF_CONTIG {
                return Ok(loc.clone());
            }
            let length = order.length(loc.contig()).ok_or_else(|| ShardError::MissingLength {
                contig: loc.contig().to_string(),
            })?;
            Ok(loc.with_stop(length)?)
        })
        .collect()
}

fn check_sorted(intervals: &[GenomeLoc], order: &ContigOrder) -> Result<(), ShardError> {
    for pair in intervals.windows(2) {
        let (previous, next) = (&pair[0], &pair[1]);
        if previous.overlaps(next) {
            return Err(ShardError::Overlapping {
                previous: previous.to_string(),
                next: next.to_string(),
            });
        }
        if !previous.is_before(next, order) {
            return Err(ShardError::Unsorted {
                previous: previous.to_string(),
                next: next.to_string(),
            });
        }
    }
    Ok(())
}
