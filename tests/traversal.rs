mod common;

use std::sync::Arc;

use common::{brute_force_depth, order, read, synthetic_reads};
use genome_traversal::{
    AlignedRead, ClaimRegistry, FnLocusWalker, FnReadWalker, InMemoryReadSource, LocusView,
    LocusWalker, SharedMemoryClaimRegistry, TraversalConfig, TraversalEngine, TraversalError,
    WalkerError,
};

type Profile = Vec<(String, u64, usize)>;

fn config(max_shard_size: u64, threads: usize) -> TraversalConfig {
    TraversalConfig::new(order())
        .with_max_shard_size(max_shard_size)
        .unwrap()
        .with_threads(threads)
}

fn total_depth() -> FnLocusWalker<
    AlignedRead,
    u64,
    impl Fn() -> u64,
    impl Fn(&LocusView<AlignedRead>) -> u64,
    impl Fn(u64, u64) -> u64,
> {
    FnLocusWalker::new(
        || 0u64,
        |locus: &LocusView<AlignedRead>| locus.depth() as u64,
        |a, b| a + b,
    )
}

fn profile() -> FnLocusWalker<
    AlignedRead,
    Profile,
    impl Fn() -> Profile,
    impl Fn(&LocusView<AlignedRead>) -> Profile,
    impl Fn(Profile, Profile) -> Profile,
> {
    FnLocusWalker::new(
        Vec::new,
        |locus: &LocusView<AlignedRead>| {
            vec![(locus.contig().to_string(), locus.position(), locus.depth())]
        },
        |mut a: Profile, b: Profile| {
            a.extend(b);
            a
        },
    )
}

#[test]
fn depth_sum_equals_aligned_bases() {
    let reads = synthetic_reads(3, 300);
    let expected: usize = brute_force_depth(&reads).values().sum();
    let source = InMemoryReadSource::new(reads, &order()).unwrap();

    let engine = TraversalEngine::local(config(250, 4)).unwrap();
    let shards = engine.shard_reference().unwrap();
    let outcome = engine.traverse_loci(&source, Arc::new(total_depth()), &shards).unwrap();

    assert_eq!(outcome.value, Some(expected as u64));
    assert_eq!(outcome.stats.shards_processed, shards.len() as u64);
    assert_eq!(outcome.stats.shards_skipped, 0);
}

#[test]
fn per_locus_output_matches_a_single_window() {
    let reads = synthetic_reads(5, 250);
    let expected: Profile = brute_force_depth(&reads)
        .into_iter()
        .map(|((contig, pos), depth)| (contig, pos, depth))
        .collect::<Vec<_>>();
    let mut expected = expected;
    let order = order();
    expected.sort_by(|a, b| order.compare_contigs(&a.0, &b.0).then(a.1.cmp(&b.1)));

    let source = InMemoryReadSource::new(reads, &order).unwrap();
    for threads in [1, 4] {
        let engine = TraversalEngine::local(config(97, threads)).unwrap();
        let shards = engine.shard_reference().unwrap();
        let outcome = engine.traverse_loci(&source, Arc::new(profile()), &shards).unwrap();
        assert_eq!(outcome.value.as_ref(), Some(&expected), "threads = {threads}");
    }
}

#[test]
fn shards_claimed_elsewhere_are_skipped() {
    let reads = synthetic_reads(9, 200);
    let source = InMemoryReadSource::new(reads, &order()).unwrap();
    let registry = Arc::new(SharedMemoryClaimRegistry::new());

    let engine =
        TraversalEngine::new(config(500, 2).with_owner("me").unwrap(), registry.clone()).unwrap();
    let shards = engine.shard_reference().unwrap();
    let taken = shards[1].span().unwrap();
    assert!(registry.claim(&taken, "someone-else").unwrap().is_owned_by("someone-else"));

    let outcome = engine.traverse_loci(&source, Arc::new(profile()), &shards).unwrap();
    assert_eq!(outcome.stats.shards_skipped, 1);
    assert_eq!(outcome.stats.shards_processed, shards.len() as u64 - 1);

    let loci = outcome.value.unwrap();
    assert!(loci.iter().all(|(contig, pos, _)| !taken.contains_position(contig, *pos)));
    for shard in shards.iter().filter(|shard| shard.id() != 1) {
        let owner = registry.owner_of(&shard.span().unwrap()).unwrap().unwrap();
        assert_eq!(owner.owner(), "me");
    }

    // A second worker finds nothing left to do.
    let late = TraversalEngine::new(config(500, 2).with_owner("late").unwrap(), registry).unwrap();
    let outcome = late.traverse_loci(&source, Arc::new(profile()), &shards).unwrap();
    assert_eq!(outcome.value, None);
    assert_eq!(outcome.stats.shards_skipped, shards.len() as u64);
}

struct FailAt(u64);

impl LocusWalker<AlignedRead> for FailAt {
    type Value = u64;

    fn init(&self) -> u64 {
        0
    }

    fn map(&self, locus: &LocusView<AlignedRead>) -> Result<u64, WalkerError> {
        if locus.contig() == "chr1" && locus.position() == self.0 {
            return Err(WalkerError::new(format!("refusing {}", locus.locus)));
        }
        Ok(1)
    }

    fn combine(&self, earlier: u64, later: u64) -> u64 {
        earlier + later
    }
}

#[test]
fn failing_walker_names_its_shard() {
    let mut reads = synthetic_reads(13, 100);
    reads.push(read("chr1", 1_490, "50M"));
    let source = InMemoryReadSource::sorted(reads, &order());

    let engine = TraversalEngine::local(config(500, 4)).unwrap();
    let shards = engine.shard_reference().unwrap();
    let err = engine.traverse_loci(&source, Arc::new(FailAt(1_500)), &shards).unwrap_err();
    assert_eq!(err.failed_shard(), Some(2));
    assert!(err.to_string().contains("refusing chr1:1500"));
}

#[test]
fn panicking_walker_is_reported_not_propagated() {
    let source = InMemoryReadSource::new(vec![read("chr2", 10, "20M")], &order()).unwrap();
    let engine = TraversalEngine::local(config(500, 2)).unwrap();
    let shards = engine.shard_reference().unwrap();
    let walker = FnLocusWalker::new(
        || 0u64,
        |locus: &LocusView<AlignedRead>| {
            if locus.position() == 15 {
                panic!("bad locus");
            }
            1
        },
        |a, b| a + b,
    );
    let err = engine.traverse_loci(&source, Arc::new(walker), &shards).unwrap_err();
    assert!(matches!(err, TraversalError::Reduce(_)));
    assert_eq!(err.failed_shard(), Some(4));
}

#[test]
fn read_traversal_visits_each_read_once() {
    let reads = synthetic_reads(21, 300);
    let names: Vec<String> = reads.iter().map(|read| read.name.to_string()).collect();
    let source = InMemoryReadSource::new(reads, &order()).unwrap();

    let engine = TraversalEngine::local(config(60, 4)).unwrap();
    let shards = engine.shard_reference().unwrap();
    let walker = FnReadWalker::new(
        Vec::new,
        |read: &AlignedRead| vec![read.name.to_string()],
        |mut a: Vec<String>, b: Vec<String>| {
            a.extend(b);
            a
        },
    );
    let outcome = engine.traverse_reads(&source, Arc::new(walker), &shards).unwrap();
    assert_eq!(outcome.value, Some(names));
    assert_eq!(outcome.stats.reads_visited, 300);
}

#[test]
fn interval_traversal_stays_inside_the_intervals() {
    let reads = synthetic_reads(17, 200);
    let source = InMemoryReadSource::new(reads, &order()).unwrap();
    let engine = TraversalEngine::local(config(40, 3)).unwrap();
    let intervals = vec![
        genome_traversal::GenomeLoc::new("chr1", 100, 180).unwrap(),
        genome_traversal::GenomeLoc::new("chr1", 900, 950).unwrap(),
        genome_traversal::GenomeLoc::new("chrM", 1, 300).unwrap(),
    ];
    let shards = engine.shard_intervals(&intervals).unwrap();
    let outcome = engine.traverse_loci(&source, Arc::new(profile()), &shards).unwrap();
    for (contig, pos, _) in outcome.value.unwrap_or_default() {
        assert!(intervals.iter().any(|loc| loc.contains_position(&contig, pos)));
    }
}

#[test]
fn downsampling_is_counted() {
    let mut reads: Vec<AlignedRead> = (0..40)
        .map(|idx| {
            read("chr1", 100 + idx % 4, "30M")
                .with_name(format!("deep{idx}"))
                .with_sample(if idx % 2 == 0 { "s1" } else { "s2" })
        })
        .collect();
    reads.push(read("chr2", 5, "10M"));
    let source = InMemoryReadSource::sorted(reads, &order());

    let engine = TraversalEngine::local(config(1_000, 2).with_downsampling(6)).unwrap();
    let shards = engine.shard_reference().unwrap();
    let deepest = FnLocusWalker::new(
        || 0usize,
        |locus: &LocusView<AlignedRead>| locus.depth(),
        |a: usize, b: usize| a.max(b),
    );
    let outcome = engine.traverse_loci(&source, Arc::new(deepest), &shards).unwrap();
    assert!(outcome.value.unwrap() <= 6);
    assert!(outcome.stats.reads_downsampled > 0);
}

#[test]
fn zero_sized_shards_are_rejected() {
    let err = TraversalConfig::new(order()).with_max_shard_size(0).unwrap_err();
    assert!(matches!(err, TraversalError::InvalidConfiguration(_)));
}
