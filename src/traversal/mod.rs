//! Sharded traversal driver
//!
//! Ties the pieces together: shards are claimed through a
//! [`ClaimRegistry`], each claimed shard is walked on a rayon pool (one
//! [`LocusWindow`] per interval for locus traversals, the plain read stream
//! for read traversals), and the per-shard values are combined in shard order
//! by a [`ReduceTree`].

mod config;
mod ledger;
mod source;
mod walker;

pub use config::{TraversalConfig, DEFAULT_OWNER, DEFAULT_SHARD_SIZE};
pub use ledger::ShardLedger;
pub use source::{read_overlaps, InMemoryReadSource, ReadIter, ReadSource, SourceError};
pub use walker::{FnLocusWalker, FnReadWalker, LocusWalker, ReadWalker, WalkerError};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, debug_span, info, warn};

use crate::claim::{ClaimRegistry, NoopClaimRegistry};
use crate::genomics::Alignment;
use crate::interval::GenomeLoc;
use crate::reduce::{panic_message, promise, ReduceError, ReduceTree, Spawner};
use crate::shard::Shard;
use crate::window::{LocusWindow, WindowStats};
use crate::TraversalError;

/// Counters aggregated over a traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraversalStats {
    /// Shards processed by this worker.
    pub shards_processed: u64,
    /// Shards left to other workers.
    pub shards_skipped: u64,
    /// Loci emitted by windows.
    pub loci: u64,
    /// Reads admitted into windows.
    pub reads_admitted: u64,
    /// Reads visited by a read walker.
    pub reads_visited: u64,
    /// Reads rejected by walker filters.
    pub reads_filtered: u64,
    /// Pileup elements removed by downsampling.
    pub reads_downsampled: u64,
}

impl TraversalStats {
    /// Add another set of counters to these.
    pub fn absorb(&mut self, other: &TraversalStats) {
        self.shards_processed += other.shards_processed;
        self.shards_skipped += other.shards_skipped;
        self.loci += other.loci;
        self.reads_admitted += other.reads_admitted;
        self.reads_visited += other.reads_visited;
        self.reads_filtered += other.reads_filtered;
        self.reads_downsampled += other.reads_downsampled;
    }

    fn absorb_window(&mut self, window: &WindowStats) {
        self.loci += window.loci;
        self.reads_admitted += window.reads_admitted;
        self.reads_filtered += window.reads_filtered;
        self.reads_downsampled += window.downsampled;
    }
}

/// Result of a traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct Traversal<V> {
    /// Combined value; `None` when no shard was processed.
    pub value: Option<V>,
    /// Aggregated counters.
    pub stats: TraversalStats,
}

/// Runs walkers over shards on a dedicated thread pool.
#[derive(Debug)]
pub struct TraversalEngine {
    config: TraversalConfig,
    registry: Arc<dyn ClaimRegistry>,
    pool: Arc<rayon::ThreadPool>,
}

impl TraversalEngine {
    /// Engine claiming shards through `registry`.
    pub fn new(
        config: TraversalConfig,
        registry: Arc<dyn ClaimRegistry>,
    ) -> Result<Self, TraversalError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|idx| format!("traversal-{idx}"))
            .build()
            .map_err(|err| TraversalError::ThreadPool(err.to_string()))?;
        Ok(Self {
            config,
            registry,
            pool: Arc::new(pool),
        })
    }

    /// Engine for a single-process run (every shard is ours).
    pub fn local(config: TraversalConfig) -> Result<Self, TraversalError> {
        Self::new(config, Arc::new(NoopClaimRegistry))
    }

    /// Active configuration.
    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }

    /// Claim registry in use.
    pub fn registry(&self) -> &Arc<dyn ClaimRegistry> {
        &self.registry
    }

    /// Shards tiling the whole reference.
    pub fn shard_reference(&self) -> Result<Vec<Shard>, TraversalError> {
        Ok(self.config.sharder()?.shard_over_reference(&self.config.order)?)
    }

    /// Shards over a sorted, non-overlapping interval list.
    pub fn shard_intervals(&self, intervals: &[GenomeLoc]) -> Result<Vec<Shard>, TraversalError> {
        Ok(self.config.sharder()?.shard_over_intervals(intervals, &self.config.order)?)
    }

    /// Run `walker` over every covered locus of `shards`.
    pub fn traverse_loci<S, W>(
        &self,
        source: &S,
        walker: Arc<W>,
        shards: &[Shard],
    ) -> Result<Traversal<W::Value>, TraversalError>
    where
        S: ReadSource,
        W: LocusWalker<S::Read>,
    {
        let combiner = Arc::clone(&walker);
        self.run(
            shards,
            move |earlier, later| combiner.combine(earlier, later),
            |shard, _previous| self.locus_shard(source, &walker, shard),
        )
    }

    /// Run `walker` over every read of `shards`. A read overlapping several
    /// shards is visited by the first one only.
    pub fn traverse_reads<S, W>(
        &self,
        source: &S,
        walker: Arc<W>,
        shards: &[Shard],
    ) -> Result<Traversal<W::Value>, TraversalError>
    where
        S: ReadSource,
        W: ReadWalker<S::Read>,
    {
        let combiner = Arc::clone(&walker);
        self.run(
            shards,
            move |earlier, later| combiner.combine(earlier, later),
            |shard, previous| read_shard(source, walker.as_ref(), shard, previous),
        )
    }

    fn locus_shard<S, W>(
        &self,
        source: &S,
        walker: &Arc<W>,
        shard: &Shard,
    ) -> Result<(W::Value, TraversalStats), TraversalError>
    where
        S: ReadSource,
        W: LocusWalker<S::Read>,
    {
        let mut acc = walker.init();
        let mut stats = TraversalStats::default();
        for loc in shard.intervals() {
            let filter = Arc::clone(walker);
            let mut window = LocusWindow::new(source.reads_in(loc)?, Arc::clone(&self.config.order))
                .with_bounds(loc.clone())
                .with_skips(self.config.include_skips)
                .with_read_filter(move |read| filter.filter(read));
            if let Some(target) = self.config.downsample_to {
                window = window.with_downsampling(target);
            }

            while let Some(locus) = window.advance()? {
                let value = walker.map(&locus)?;
                acc = walker.combine(acc, value);
            }
            stats.absorb_window(&window.stats());
        }
        stats.shards_processed = 1;
        Ok((acc, stats))
    }

    fn run<V, C, F>(
        &self,
        shards: &[Shard],
        combine: C,
        work: F,
    ) -> Result<Traversal<V>, TraversalError>
    where
        V: Send + 'static,
        C: Fn(V, V) -> V + Send + Sync + 'static,
        F: Fn(&Shard, &[Shard]) -> Result<(V, TraversalStats), TraversalError> + Sync,
    {
        info!(shards = shards.len(), owner = %self.config.owner, "starting traversal");
        let mut ledger = ShardLedger::new(shards.len());
        let mut stats = TraversalStats::default();

        let tree = ReduceTree::with_spawner(combine, Spawner::Pool(Arc::clone(&self.pool)));
        let mut pending = Vec::new();
        for (idx, shard) in shards.iter().enumerate() {
            if !self.claim(shard)? {
                ledger.mark_skipped(idx);
                stats.shards_skipped += 1;
                continue;
            }
            let (promise, handle) = promise();
            tree.add_entry(handle)?;
            pending.push((idx, promise));
        }
        tree.complete();

        let ledger = Mutex::new(ledger);
        let stats = Mutex::new(stats);
        self.pool.scope(|scope| {
            for (idx, promise) in pending {
                let shard = &shards[idx];
                let previous = &shards[..idx];
                let (work, ledger, stats) = (&work, &ledger, &stats);
                scope.spawn(move |_| {
                    let _span =
                        debug_span!("shard", id = shard.id(), contig = shard.contig()).entered();
                    let outcome = match catch_unwind(AssertUnwindSafe(|| work(shard, previous))) {
                        Ok(Ok((value, shard_stats))) => {
                            debug!(
                                loci = shard_stats.loci,
                                reads = shard_stats.reads_admitted,
                                "shard done"
                            );
                            stats.lock().absorb(&shard_stats);
                            ledger.lock().mark_complete(idx);
                            Ok(value)
                        }
                        Ok(Err(err)) => {
                            warn!(shard = shard.id(), error = %err, "shard failed");
                            Err(ReduceError::ShardFailed {
                                shard: shard.id(),
                                message: err.to_string(),
                            })
                        }
                        Err(payload) => {
                            let message = format!("panicked: {}", panic_message(payload.as_ref()));
                            warn!(shard = shard.id(), %message, "shard panicked");
                            Err(ReduceError::ShardFailed {
                                shard: shard.id(),
                                message,
                            })
                        }
                    };
                    promise.resolve(outcome);
                });
            }
        });

        let value = tree.result()?;
        let ledger = ledger.into_inner();
        if !ledger.all_accounted_for() {
            return Err(TraversalError::LedgerIncomplete {
                missing: ledger.missing(),
            });
        }
        let stats = stats.into_inner();
        info!(
            processed = stats.shards_processed,
            skipped = stats.shards_skipped,
            loci = stats.loci,
            reads = stats.reads_admitted + stats.reads_visited,
            downsampled = stats.reads_downsampled,
            "traversal complete"
        );
        Ok(Traversal { value, stats })
    }

    // Whether this worker owns `shard`.
    fn claim(&self, shard: &Shard) -> Result<bool, TraversalError> {
        let Some(span) = shard.span() else {
            return Ok(true);
        };
        let winner = self.registry.claim(&span, &self.config.owner)?;
        if winner.is_owned_by(&self.config.owner) {
            Ok(true)
        } else {
            debug!(shard = shard.id(), winner = winner.owner(), "shard claimed elsewhere");
            Ok(false)
        }
    }
}

fn read_shard<S, W>(
    source: &S,
    walker: &W,
    shard: &Shard,
    previous: &[Shard],
) -> Result<(W::Value, TraversalStats), TraversalError>
where
    S: ReadSource,
    W: ReadWalker<S::Read>,
{
    let mut acc = walker.init();
    let mut stats = TraversalStats::default();
    for read in source.reads_for(shard)? {
        if owned_earlier(&read, previous) {
            continue;
        }
        if !walker.filter(&read) {
            stats.reads_filtered += 1;
            continue;
        }
        let value = walker.map(&read)?;
        acc = walker.combine(acc, value);
        stats.reads_visited += 1;
    }
    stats.shards_processed = 1;
    Ok((acc, stats))
}

// Whether an earlier shard also overlaps `read`. Shards are sorted and
// disjoint, so the backwards scan stops at the first interval ending before
// the read or sitting on another contig.
fn owned_earlier<R: Alignment>(read: &R, previous: &[Shard]) -> bool {
    for loc in previous.iter().rev().flat_map(|shard| shard.intervals().iter().rev()) {
        if loc.contig() != read.contig() || loc.stop() < read.alignment_start() {
            return false;
        }
        if read_overlaps(read, loc) {
            return true;
        }
    }
    false
}
