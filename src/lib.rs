//! # Genome traversal engine
//!
//! Streams coordinate-sorted alignments and presents them to analyses one
//! reference position (or one read) at a time, in parallel over independent
//! shards of the genome, while keeping results deterministic.
//!
//! ## Pipeline
//!
//! 1. **Intervals**: [`GenomeLoc`] and [`GenomeLocParser`] describe the
//!    territory, ordered by an explicit [`ContigOrder`]
//! 2. **Sharding**: [`Sharder`] cuts the territory into bounded shards
//! 3. **Pileups**: a [`LocusWindow`] merges per-read [`AlignmentCursor`]s
//!    into one [`LocusView`] per covered position, optionally leveled by a
//!    [`LevelingDownsampler`]
//! 4. **Reduction**: a [`ReduceTree`] combines shard results in genome
//!    order as they complete
//! 5. **Coordination**: a [`ClaimRegistry`] keeps cooperating workers from
//!    processing the same shard twice
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use genome_traversal::{
//!     AlignedRead, ContigOrder, FnLocusWalker, InMemoryReadSource, LocusView, TraversalConfig,
//!     TraversalEngine,
//! };
//!
//! # fn main() -> Result<(), genome_traversal::TraversalError> {
//! let order = Arc::new(ContigOrder::from_dictionary([("chr1", 10_000)])?);
//! let reads: Vec<AlignedRead> = Vec::new();
//! let source = InMemoryReadSource::sorted(reads, &order);
//!
//! let engine = TraversalEngine::local(TraversalConfig::new(Arc::clone(&order)))?;
//! let shards = engine.shard_reference()?;
//! let depth = FnLocusWalker::new(
//!     || 0u64,
//!     |locus: &LocusView<AlignedRead>| locus.depth() as u64,
//!     |a, b| a + b,
//! );
//! let total = engine.traverse_loci(&source, Arc::new(depth), &shards)?;
//! println!("total depth: {:?}", total.value);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod claim; // Cooperative shard claiming
pub mod downsample; // Fair per-sample downsampling
pub mod genomics; // Reads, CIGARs, cursors and pileups
pub mod interval; // Genome intervals and their parser
pub mod reduce; // Order-preserving asynchronous reduction
pub mod shard; // Work partitioning
pub mod traversal; // Sharded traversal driver
pub mod window; // Per-position pileup generation

pub use claim::{
    ClaimError, ClaimRegistry, NoopClaimRegistry, ProcessingLoc, SharedMemoryClaimRegistry,
};
pub use downsample::{Downsampler, LevelingDownsampler, PassThroughDownsampler};
pub use genomics::{
    AlignedRead, Alignment, AlignmentCursor, BaseCounts, Cigar, CigarError, CigarOp, CigarOpKind,
    LocusView, PileupElement,
};
pub use interval::{parse_loc, ContigOrder, GenomeLoc, GenomeLocParser, GenomeLocSet, IntervalError};
pub use reduce::{ReduceError, ReduceHandle, ReduceTree};
pub use shard::{Shard, ShardError, ShardId, Sharder};
pub use traversal::{
    FnLocusWalker, FnReadWalker, InMemoryReadSource, LocusWalker, ReadSource, ReadWalker,
    SourceError, Traversal, TraversalConfig, TraversalEngine, TraversalStats, WalkerError,
};
pub use window::{LocusWindow, WindowError, WindowStats};

use thiserror::Error;

/// Errors that can occur during a traversal.
#[derive(Error, Debug)]
pub enum TraversalError {
    /// Configuration rejected.
    #[error("invalid traversal configuration: {0}")]
    InvalidConfiguration(String),

    /// Interval could not be built or parsed.
    #[error(transparent)]
    Interval(#[from] IntervalError),

    /// Malformed edit script.
    #[error(transparent)]
    Cigar(#[from] CigarError),

    /// Pileup consistency violation.
    #[error(transparent)]
    Window(#[from] WindowError),

    /// Sharding failed.
    #[error(transparent)]
    Shard(#[from] ShardError),

    /// Reduction failed (including failed shards).
    #[error(transparent)]
    Reduce(#[from] ReduceError),

    /// Claim registry failed.
    #[error(transparent)]
    Claim(#[from] ClaimError),

    /// Read source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Walker reported a failure.
    #[error(transparent)]
    Walker(#[from] WalkerError),

    /// Worker pool could not be built.
    #[error("cannot build worker pool: {0}")]
    ThreadPool(String),

    /// Some shards were neither processed nor claimed elsewhere.
    #[error("shards {missing:?} were never processed")]
    LedgerIncomplete {
        /// Unaccounted shard positions.
        missing: Vec<ShardId>,
    },
}

impl TraversalError {
    /// Shard named by a failure, if any.
    pub fn failed_shard(&self) -> Option<ShardId> {
        match self {
            TraversalError::Reduce(ReduceError::ShardFailed { shard, .. }) => Some(*shard),
            _ => None,
        }
    }
}
