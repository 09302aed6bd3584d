//! Performance benchmarks

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use genome_traversal::*;

const CONTIG_LEN: u64 = 200_000;

fn order() -> Arc<ContigOrder> {
    Arc::new(ContigOrder::from_dictionary([("chr1", CONTIG_LEN), ("chr2", CONTIG_LEN)]).unwrap())
}

// Evenly tiled 100bp reads, every fifth one spliced.
fn reads(depth: u64) -> Vec<AlignedRead> {
    let mut reads = Vec::new();
    for contig in ["chr1", "chr2"] {
        let mut start = 1;
        let mut idx = 0u64;
        while start + 200 < CONTIG_LEN {
            let cigar: Cigar = if idx % 5 == 0 { "50M100N50M" } else { "100M" }.parse().unwrap();
            let len = cigar.read_length();
            let reverse = idx % 2 == 0;
            let (bases, quals) = (vec![b'C'; len], vec![30; len]);
            reads.push(AlignedRead::new(contig, start, 60, cigar, bases, quals, reverse));
            idx += 1;
            start += 100 / depth.max(1);
        }
    }
    reads
}

fn benchmark_window(c: &mut Criterion) {
    let reads = reads(20);
    c.bench_function("window_depth20_chr1", |b| {
        b.iter(|| {
            let bounds = GenomeLoc::new("chr1", 1, 50_000).unwrap();
            let total: usize = LocusWindow::new(reads.clone(), order())
                .with_bounds(bounds)
                .map(|view| view.map(|view| view.depth()).unwrap_or(0))
                .sum();
            black_box(total);
        });
    });
}

fn benchmark_traversal(c: &mut Criterion) {
    let source = InMemoryReadSource::new(reads(10), &order()).unwrap();
    let mut group = c.benchmark_group("traverse_loci");
    for threads in [1usize, 4] {
        let config = TraversalConfig::new(order())
            .with_max_shard_size(25_000)
            .unwrap()
            .with_threads(threads);
        let engine = TraversalEngine::local(config).unwrap();
        let shards = engine.shard_reference().unwrap();
        let walker = Arc::new(FnLocusWalker::new(
            || 0u64,
            |locus: &LocusView<AlignedRead>| locus.depth() as u64,
            |a, b| a + b,
        ));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, _| {
            b.iter(|| {
                black_box(engine.traverse_loci(&source, Arc::clone(&walker), &shards).unwrap())
            });
        });
    }
    group.finish();
}

fn benchmark_reduce(c: &mut Criterion) {
    c.bench_function("reduce_tree_4096_leaves", |b| {
        b.iter(|| {
            let tree = ReduceTree::new(|a: u64, b: u64| a.wrapping_add(b));
            for value in 0..4_096u64 {
                tree.add_entry(ReduceHandle::ready(value)).unwrap();
            }
            tree.complete();
            black_box(tree.result().unwrap());
        });
    });
}

criterion_group!(benches, benchmark_window, benchmark_traversal, benchmark_reduce);
criterion_main!(benches);
