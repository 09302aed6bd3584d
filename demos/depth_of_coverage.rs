//! Depth of coverage over a synthetic genome.
//!
//! Two workers share one claim registry and split the shards between them;
//! their per-contig totals are merged at the end.
//!
//! ```text
//! RUST_LOG=genome_traversal=debug cargo run --example depth_of_coverage
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use genome_traversal::{
    AlignedRead, Cigar, ContigOrder, FnLocusWalker, InMemoryReadSource, LocusView,
    SharedMemoryClaimRegistry, TraversalConfig, TraversalEngine, TraversalStats,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// contig -> (summed depth, covered loci)
type Coverage = BTreeMap<String, (u64, u64)>;

const CONTIGS: [(&str, u64); 3] = [("chr1", 60_000), ("chr2", 40_000), ("chrM", 16_569)];

fn synthetic_source(order: &ContigOrder) -> Result<InMemoryReadSource<AlignedRead>> {
    let templates: [Cigar; 4] = [
        "100M".parse()?,
        "40M2I58M".parse()?,
        "10S60M5D30M".parse()?,
        "50M300N50M".parse()?,
    ];
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    let mut reads = Vec::new();
    for (contig, length) in CONTIGS {
        for idx in 0..length / 25 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let cigar = templates[(state % 4) as usize].clone();
            let start = 1 + state % (length - cigar.reference_length());
            let len = cigar.read_length();
            let (bases, quals) = (vec![b'A'; len], vec![30; len]);
            let read = AlignedRead::new(contig, start, 60, cigar, bases, quals, idx % 2 == 1)
                .with_name(format!("{contig}-{idx}"))
                .with_sample(if idx % 3 == 0 { "tumor" } else { "normal" });
            reads.push(read);
        }
    }
    Ok(InMemoryReadSource::sorted(reads, order))
}

fn merge(mut earlier: Coverage, later: Coverage) -> Coverage {
    for (contig, (depth, loci)) in later {
        let entry = earlier.entry(contig).or_default();
        entry.0 += depth;
        entry.1 += loci;
    }
    earlier
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let order = Arc::new(ContigOrder::from_dictionary(CONTIGS)?);
    let source = Arc::new(synthetic_source(&order)?);
    let registry = Arc::new(SharedMemoryClaimRegistry::new());
    info!(reads = source.len(), contigs = order.len(), "generated reads");

    let workers: Vec<_> = ["worker-a", "worker-b"]
        .into_iter()
        .map(|owner| {
            let (order, source, registry) =
                (Arc::clone(&order), Arc::clone(&source), Arc::clone(&registry));
            thread::spawn(move || -> Result<(Option<Coverage>, TraversalStats)> {
                let config = TraversalConfig::new(order)
                    .with_max_shard_size(5_000)?
                    .with_threads(2)
                    .with_downsampling(250)
                    .with_owner(owner)?;
                let engine = TraversalEngine::new(config, registry)?;
                let shards = engine.shard_reference()?;
                let walker = FnLocusWalker::new(
                    Coverage::new,
                    |locus: &LocusView<AlignedRead>| {
                        BTreeMap::from([(locus.contig().to_string(), (locus.depth() as u64, 1))])
                    },
                    merge,
                );
                let outcome = engine
                    .traverse_loci(source.as_ref(), Arc::new(walker), &shards)
                    .with_context(|| format!("{owner} failed"))?;
                info!(
                    owner,
                    processed = outcome.stats.shards_processed,
                    skipped = outcome.stats.shards_skipped,
                    "worker done"
                );
                Ok((outcome.value, outcome.stats))
            })
        })
        .collect();

    let mut coverage = Coverage::new();
    let mut stats = TraversalStats::default();
    for worker in workers {
        let (value, worker_stats) = worker
            .join()
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
        coverage = merge(coverage, value.unwrap_or_default());
        stats.absorb(&worker_stats);
    }

    for (contig, (depth, loci)) in &coverage {
        let length = order.length(contig).unwrap_or(0);
        println!(
            "{contig}\tcovered={loci}/{length}\tmean_depth={:.2}",
            *depth as f64 / (*loci).max(1) as f64
        );
    }
    println!(
        "shards processed={} skipped={} loci={} downsampled={}",
        stats.shards_processed, stats.shards_skipped, stats.loci, stats.reads_downsampled
    );
    Ok(())
}
