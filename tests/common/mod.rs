#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use genome_traversal::{AlignedRead, Cigar, CigarOpKind, ContigOrder};

pub const CONTIGS: [(&str, u64); 3] = [("chr1", 2_000), ("chr2", 1_200), ("chrM", 300)];

const TEMPLATES: [&str; 7] = [
    "50M",
    "10M2I38M",
    "20M5D30M",
    "5S45M",
    "25M100N25M",
    "2S20M1D20M3S",
    "3H30M1I10M",
];

const SAMPLES: [&str; 3] = ["s1", "s2", "s3"];

pub fn order() -> Arc<ContigOrder> {
    Arc::new(ContigOrder::from_dictionary(CONTIGS).expect("valid dictionary"))
}

/// Small deterministic generator so fixtures do not depend on a rand crate.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed ^ 0x9E37_79B9_7F4A_7C15)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }

    pub fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}

pub fn read(contig: &str, start: u64, cigar: &str) -> AlignedRead {
    let cigar: Cigar = cigar.parse().expect("valid cigar");
    let len = cigar.read_length();
    AlignedRead::new(contig, start, 60, cigar, vec![b'A'; len], vec![30; len], false)
}

/// `count` reads spread over [`CONTIGS`], sorted by contig rank and start.
pub fn synthetic_reads(seed: u64, count: usize) -> Vec<AlignedRead> {
    let mut rng = Lcg::new(seed);
    let mut reads = Vec::with_capacity(count);
    for idx in 0..count {
        let (contig, length) = CONTIGS[rng.below(CONTIGS.len() as u64) as usize];
        let cigar: Cigar = TEMPLATES[rng.below(TEMPLATES.len() as u64) as usize]
            .parse()
            .expect("valid template");
        let span = cigar.reference_length();
        let start = 1 + rng.below(length - span);
        let len = cigar.read_length();
        let sequence: Vec<u8> = (0..len).map(|_| b"ACGT"[rng.below(4) as usize]).collect();
        let read = AlignedRead::new(contig, start, 60, cigar, sequence, vec![30; len], idx % 2 == 0)
            .with_name(format!("read{idx}"))
            .with_sample(SAMPLES[rng.below(SAMPLES.len() as u64) as usize]);
        reads.push(read);
    }
    let order = order();
    reads.sort_by(|lhs, rhs| {
        order
            .compare_contigs(&lhs.contig, &rhs.contig)
            .then_with(|| lhs.start.cmp(&rhs.start))
    });
    reads
}

/// Depth per position by walking each CIGAR directly. Deletions count,
/// skips (`N`) do not.
pub fn brute_force_depth(reads: &[AlignedRead]) -> BTreeMap<(String, u64), usize> {
    let mut depth = BTreeMap::new();
    for read in reads {
        let mut pos = read.start;
        for op in read.cigar.ops() {
            match op.kind {
                CigarOpKind::Match | CigarOpKind::Deletion => {
                    for offset in 0..u64::from(op.len) {
                        *depth.entry((read.contig.to_string(), pos + offset)).or_insert(0) += 1;
                    }
                    pos += u64::from(op.len);
                }
                CigarOpKind::Skip => pos += u64::from(op.len),
                _ => {}
            }
        }
    }
    depth
}
