//! Sliding-window locus accumulator
//!
//! Merges the cursors of many reads into one pileup per reference position.
//! Reads must arrive sorted by contig rank and alignment start; the window
//! admits them lazily, steps every active cursor one base per position and
//! evicts reads as soon as they end. Uncovered stretches of the genome are
//! skipped rather than stepped through.

mod pushback;

pub use pushback::PushbackIterator;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::downsample::LevelingDownsampler;
use crate::genomics::{
    Alignment, AlignmentCursor, CigarError, CigarOpKind, LocusView, PileupElement,
};
use crate::interval::{ContigOrder, GenomeLoc};

/// Caller-supplied read predicate; reads for which it returns `false` are
/// never admitted.
pub type ReadFilter<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

// Pileup element tagged with its admission index.
type Indexed<R> = (usize, PileupElement<R>);

/// Consistency violations raised while building pileups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    /// The read's edit script is malformed.
    #[error("malformed read {read}: {source}")]
    MalformedRead {
        /// Read description.
        read: String,
        /// Underlying CIGAR problem.
        source: CigarError,
    },

    /// Declared alignment end disagrees with the edit script.
    #[error("read {read} declares alignment end {declared} but its CIGAR ends at {computed}")]
    SpanMismatch {
        /// Read description.
        read: String,
        /// End reported by the record.
        declared: u64,
        /// End implied by start and CIGAR.
        computed: u64,
    },

    /// The cursor could not reach a position the read claims to cover.
    #[error("cursor for read {read} cannot reach position {position}")]
    CursorExhausted {
        /// Read description.
        read: String,
        /// Position that was requested.
        position: u64,
    },

    /// Computed read offset lies outside the read.
    #[error("read {read} has offset {offset} at position {position}, outside [0, {read_length})")]
    OffsetOutOfBounds {
        /// Read description.
        read: String,
        /// Reference position.
        position: u64,
        /// Computed read offset.
        offset: i64,
        /// Length of the read.
        read_length: usize,
    },

    /// Read claims to start at position 0; positions are 1-based.
    #[error("read {read} starts at position 0")]
    ZeroStart {
        /// Read description.
        read: String,
    },

    /// Input reads are not sorted by contig rank and start.
    #[error("reads are not sorted: {next} arrived after {previous}")]
    UnsortedInput {
        /// Last accepted read position.
        previous: String,
        /// Offending read position.
        next: String,
    },
}

/// Counters collected by one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    /// Loci emitted.
    pub loci: u64,
    /// Reads admitted into the window.
    pub reads_admitted: u64,
    /// Reads rejected by a read filter.
    pub reads_filtered: u64,
    /// Reads dropped because they do not overlap the window bounds.
    pub reads_out_of_bounds: u64,
    /// Pileup elements removed by downsampling.
    pub downsampled: u64,
}

impl WindowStats {
    /// Add another window's counters to these.
    pub fn absorb(&mut self, other: &WindowStats) {
        self.loci += other.loci;
        self.reads_admitted += other.reads_admitted;
        self.reads_filtered += other.reads_filtered;
        self.reads_out_of_bounds += other.reads_out_of_bounds;
        self.downsampled += other.downsampled;
    }
}

/// Whether the read aligns with a single non-clip operation (no indels or
/// splices). Handy as a read filter.
pub fn is_single_operation<R: Alignment>(read: &R) -> bool {
    read.cigar_ops()
        .iter()
        .filter(|op| !op.kind.is_clip_or_pad() && op.len > 0)
        .count()
        <= 1
}

#[derive(Debug)]
struct ActiveRead<R> {
    read: Arc<R>,
    cursor: AlignmentCursor,
    end: u64,
}

/// Per-position pileup generator over one sorted read stream.
pub struct LocusWindow<R, I>
where
    R: Alignment,
    I: Iterator<Item = R>,
{
    reads: PushbackIterator<I>,
    order: Arc<ContigOrder>,
    bounds: Option<GenomeLoc>,
    filters: Vec<ReadFilter<R>>,
    downsampler: Option<LevelingDownsampler<Indexed<R>>>,
    include_skips: bool,
    active: Vec<ActiveRead<R>>,
    contig: Option<Arc<str>>,
    position: u64,
    last_taken: Option<(Arc<str>, u64)>,
    stats: WindowStats,
    finished: bool,
}

impl<R, I> fmt::Debug for LocusWindow<R, I>
where
    R: Alignment,
    I: Iterator<Item = R>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocusWindow")
            .field("bounds", &self.bounds)
            .field("contig", &self.contig)
            .field("position", &self.position)
            .field("active", &self.active.len())
            .field("filters", &self.filters.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<R, I> LocusWindow<R, I>
where
    R: Alignment + 'static,
    I: Iterator<Item = R>,
{
    /// Window over `reads`, which must be sorted by `order` and start.
    pub fn new<T>(reads: T, order: Arc<ContigOrder>) -> Self
    where
        T: IntoIterator<Item = R, IntoIter = I>,
    {
        Self {
            reads: PushbackIterator::new(reads.into_iter()),
            order,
            bounds: None,
            filters: Vec::new(),
            downsampler: None,
            include_skips: false,
            active: Vec::new(),
            contig: None,
            position: 0,
            last_taken: None,
            stats: WindowStats::default(),
            finished: false,
        }
    }

    /// Only emit loci inside `bounds` (typically one shard interval).
    pub fn with_bounds(mut self, bounds: GenomeLoc) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Admit only reads for which `keep` returns true.
    pub fn with_read_filter<F>(mut self, keep: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.filters.push(Arc::new(keep));
        self
    }

    /// Admit only reads accepted by every filter in `filters`.
    pub fn with_read_filters(mut self, filters: impl IntoIterator<Item = ReadFilter<R>>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Level every pileup deeper than `target` across samples. Reduced
    /// records are never discarded. Loci left empty by a target of 0 are
    /// not emitted.
    pub fn with_downsampling(mut self, target: usize) -> Self {
        let downsampler = LevelingDownsampler::new(target)
            .with_protected(|(_, element): &Indexed<R>| element.read.is_reduced());
        self.downsampler = Some(downsampler);
        self
    }

    /// Include reads that skip the locus (`N`) in pileups.
    pub fn with_skips(mut self, include: bool) -> Self {
        self.include_skips = include;
        self
    }

    /// Counters collected so far.
    pub fn stats(&self) -> WindowStats {
        self.stats
    }

    /// Reads currently overlapping the window position.
    pub fn active_reads(&self) -> usize {
        self.active.len()
    }

    /// Produce the next pileup, or `None` once the stream (or the bounds)
    /// is exhausted.
    pub fn advance(&mut self) -> Result<Option<LocusView<R>>, WindowError> {
        match self.advance_inner() {
            Err(err) => {
                self.finished = true;
                Err(err)
            }
            ok => ok,
        }
    }

    fn advance_inner(&mut self) -> Result<Option<LocusView<R>>, WindowError> {
        while !self.finished {
            let mut next_pos = self.position + 1;
            self.active.retain(|entry| entry.end >= next_pos);

            if self.active.is_empty() {
                let Some(read) = self.next_read()? else {
                    self.finish();
                    break;
                };
                if self.contig.as_deref() != Some(read.contig()) {
                    trace!(contig = read.contig(), "window moves to new contig");
                    self.contig = Some(self.order.intern(read.contig()));
                    next_pos = 1;
                }
                next_pos = next_pos.max(read.alignment_start());
                if let Some(bounds) = &self.bounds {
                    next_pos = next_pos.max(bounds.start());
                }
                self.reads.unget(read);
            }

            if self.bounds.as_ref().is_some_and(|bounds| next_pos > bounds.stop()) {
                self.finish();
                break;
            }

            while let Some(read) = self.next_read()? {
                let admissible = self.contig.as_deref() == Some(read.contig())
                    && read.alignment_start() <= next_pos;
                if !admissible {
                    self.reads.unget(read);
                    break;
                }
                self.admit(read, next_pos)?;
            }

            self.position = next_pos;
            if self.active.is_empty() {
                continue;
            }

            let mut elements = self.pileup_at(next_pos)?;
            if elements.is_empty() {
                continue;
            }
            self.downsample(&mut elements);
            if elements.is_empty() {
                continue;
            }

            let Some(contig) = self.contig.clone() else {
                continue;
            };
            self.stats.loci += 1;
            return Ok(Some(LocusView {
                locus: GenomeLoc::from_parts(contig, next_pos, next_pos),
                elements,
            }));
        }
        Ok(None)
    }

    fn finish(&mut self) {
        if !self.finished {
            debug!(
                loci = self.stats.loci,
                admitted = self.stats.reads_admitted,
                filtered = self.stats.reads_filtered,
                downsampled = self.stats.downsampled,
                "locus window exhausted"
            );
        }
        self.finished = true;
        self.active.clear();
    }

    // Next read that passes the filters and overlaps the bounds.
    fn next_read(&mut self) -> Result<Option<R>, WindowError> {
        while let Some(read) = self.reads.next() {
            self.check_sorted(&read)?;
            if !self.overlaps_bounds(&read) {
                self.stats.reads_out_of_bounds += 1;
                continue;
            }
            if !self.filters.iter().all(|keep| keep(&read)) {
                self.stats.reads_filtered += 1;
                continue;
            }
            return Ok(Some(read));
        }
        Ok(None)
    }

    fn check_sorted(&mut self, read: &R) -> Result<(), WindowError> {
        if let Some((contig, start)) = &self.last_taken {
            let ordering = self
                .order
                .compare_contigs(contig, read.contig())
                .then_with(|| start.cmp(&read.alignment_start()));
            if ordering == Ordering::Greater {
                return Err(WindowError::UnsortedInput {
                    previous: format!("{contig}:{start}"),
                    next: describe(read),
                });
            }
            if contig.as_ref() == read.contig() && *start == read.alignment_start() {
                return Ok(());
            }
        }
        self.last_taken = Some((self.order.intern(read.contig()), read.alignment_start()));
        Ok(())
    }

    fn overlaps_bounds(&self, read: &R) -> bool {
        match &self.bounds {
            None => true,
            Some(bounds) => {
                bounds.contig() == read.contig()
                    && read.alignment_start() <= bounds.stop()
                    && read.alignment_end() >= bounds.start()
            }
        }
    }

    fn admit(&mut self, read: R, position: u64) -> Result<(), WindowError> {
        if read.alignment_start() == 0 {
            return Err(WindowError::ZeroStart { read: describe(&read) });
        }
        let cursor = AlignmentCursor::for_read(&read).map_err(|source| WindowError::MalformedRead {
            read: describe(&read),
            source,
        })?;

        let declared = read.alignment_end();
        let span: u64 = read
            .cigar_ops()
            .iter()
            .filter(|op| op.kind.consumes_reference())
            .map(|op| u64::from(op.len))
            .sum();
        let computed = read.alignment_start() + span - 1;
        if declared != computed {
            return Err(WindowError::SpanMismatch {
                read: describe(&read),
                declared,
                computed,
            });
        }

        if declared < position {
            self.stats.reads_out_of_bounds += 1;
            return Ok(());
        }

        self.stats.reads_admitted += 1;
        self.active.push(ActiveRead {
            read: Arc::new(read),
            cursor,
            end: declared,
        });
        Ok(())
    }

    fn pileup_at(&mut self, position: u64) -> Result<Vec<PileupElement<R>>, WindowError> {
        let mut elements = Vec::with_capacity(self.active.len());
        for entry in &mut self.active {
            let op = step_to(entry, position)?;
            if op == CigarOpKind::Skip && !self.include_skips {
                continue;
            }

            let offset = i64::from(entry.cursor.read_offset());
            let read_length = entry.read.read_length();
            if offset < 0 || offset as usize >= read_length {
                return Err(WindowError::OffsetOutOfBounds {
                    read: describe(entry.read.as_ref()),
                    position,
                    offset,
                    read_length,
                });
            }

            elements.push(PileupElement {
                read: Arc::clone(&entry.read),
                offset: offset as usize,
                op,
                before_insertion: entry.cursor.is_before_insertion(),
                after_insertion: entry.cursor.is_after_insertion(),
                before_deletion: entry.cursor.is_before_deletion(),
                after_deletion: entry.cursor.is_after_deletion(),
            });
        }
        Ok(elements)
    }

    fn downsample(&mut self, elements: &mut Vec<PileupElement<R>>) {
        let Some(downsampler) = self.downsampler.as_mut() else {
            return;
        };
        if elements.len() <= downsampler.target() {
            return;
        }

        let mut groups: BTreeMap<String, Vec<Indexed<R>>> = BTreeMap::new();
        for (idx, element) in elements.drain(..).enumerate() {
            let key = element.read.sample().unwrap_or_default().to_string();
            groups.entry(key).or_default().push((idx, element));
        }

        let removed = downsampler.level_map(&mut groups);
        self.stats.downsampled += removed as u64;

        // Restore admission order across samples.
        let mut survivors: Vec<Indexed<R>> = groups.into_values().flatten().collect();
        survivors.sort_by_key(|(idx, _)| *idx);
        elements.extend(survivors.into_iter().map(|(_, element)| element));
    }
}

impl<R, I> Iterator for LocusWindow<R, I>
where
    R: Alignment + 'static,
    I: Iterator<Item = R>,
{
    type Item = Result<LocusView<R>, WindowError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}

fn step_to<R: Alignment>(
    entry: &mut ActiveRead<R>,
    position: u64,
) -> Result<CigarOpKind, WindowError> {
    loop {
        if let Some(current) = entry.cursor.genome_position() {
            if current == position {
                if let Some(op) = entry.cursor.current_op() {
                    return Ok(op.kind);
                }
            }
            if current >= position {
                break;
            }
        }
        if entry.cursor.step_forward().is_none() {
            break;
        }
    }
    Err(WindowError::CursorExhausted {
        read: describe(entry.read.as_ref()),
        position,
    })
}

fn describe<R: Alignment + ?Sized>(read: &R) -> String {
    match read.read_name() {
        Some(name) if !name.is_empty() => {
            format!("{name}@{}:{}", read.contig(), read.alignment_start())
        }
        _ => format!("{}:{}", read.contig(), read.alignment_start()),
    }
}
