use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::CigarError;

/// CIGAR operation kinds describing how a read aligns to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOpKind {
    /// Consuming match/mismatch (`M`, `=`, `X`).
    Match,
    /// Insertion relative to the reference.
    Insertion,
    /// Deletion relative to the reference.
    Deletion,
    /// Soft clipping (sequence present in read only).
    SoftClip,
    /// Hard clipping (trimmed sequence not present in read).
    HardClip,
    /// Silent padding.
    Padding,
    /// Skipped reference region (`N`, e.g. a splice junction).
    Skip,
}

impl CigarOpKind {
    /// Whether the operation consumes read bases.
    pub fn consumes_read(self) -> bool {
        matches!(self, Self::Match | Self::Insertion | Self::SoftClip)
    }

    /// Whether the operation consumes reference bases.
    pub fn consumes_reference(self) -> bool {
        matches!(self, Self::Match | Self::Deletion | Self::Skip)
    }

    /// Reference-consuming gap (`D` or `N`).
    pub fn is_gap(self) -> bool {
        matches!(self, Self::Deletion | Self::Skip)
    }

    /// Clipping or padding, which never places a base on either sequence.
    pub fn is_clip_or_pad(self) -> bool {
        matches!(self, Self::SoftClip | Self::HardClip | Self::Padding)
    }

    /// SAM code for the operation.
    pub fn code(self) -> char {
        match self {
            Self::Match => 'M',
            Self::Insertion => 'I',
            Self::Deletion => 'D',
            Self::SoftClip => 'S',
            Self::HardClip => 'H',
            Self::Padding => 'P',
            Self::Skip => 'N',
        }
    }

    fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'M' | '=' | 'X' => Self::Match,
            'I' => Self::Insertion,
            'D' => Self::Deletion,
            'S' => Self::SoftClip,
            'H' => Self::HardClip,
            'P' => Self::Padding,
            'N' => Self::Skip,
            _ => return None,
        })
    }
}

/// CIGAR operation with length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CigarOp {
    /// Operation kind.
    pub kind: CigarOpKind,
    /// Number of bases affected by the operation.
    pub len: u32,
}

impl CigarOp {
    /// Construct a new CIGAR operation.
    pub fn new(kind: CigarOpKind, len: u32) -> Self {
        Self { kind, len }
    }
}

/// Ordered edit script of a read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Cigar(Vec<CigarOp>);

impl Cigar {
    /// Wrap a list of operations.
    pub fn new(ops: Vec<CigarOp>) -> Self {
        Self(ops)
    }

    /// Operations in order.
    pub fn ops(&self) -> &[CigarOp] {
        &self.0
    }

    /// Whether the script has no operations.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reference bases spanned.
    pub fn reference_length(&self) -> u64 {
        self.0
            .iter()
            .filter(|op| op.kind.consumes_reference())
            .map(|op| u64::from(op.len))
            .sum()
    }

    /// Read bases described.
    pub fn read_length(&self) -> usize {
        self.0
            .iter()
            .filter(|op| op.kind.consumes_read())
            .map(|op| op.len as usize)
            .sum()
    }

    /// Whether the script has more than one non-clip operation (e.g. indels
    /// or splices); a common read filter.
    pub fn is_multi_operation(&self) -> bool {
        self.0
            .iter()
            .filter(|op| !op.kind.is_clip_or_pad() && op.len > 0)
            .count()
            > 1
    }
}

impl From<Vec<CigarOp>> for Cigar {
    fn from(ops: Vec<CigarOp>) -> Self {
        Self(ops)
    }
}

impl FromStr for Cigar {
    type Err = CigarError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CigarError::InvalidText {
            text: text.to_string(),
            reason: reason.to_string(),
        };

        let mut ops = Vec::new();
        let mut len: Option<u32> = None;
        for ch in text.chars() {
            if let Some(digit) = ch.to_digit(10) {
                let next = len
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(digit))
                    .ok_or_else(|| invalid("operation length overflows"))?;
                len = Some(next);
                continue;
            }
            let kind = CigarOpKind::from_code(ch)
                .ok_or_else(|| invalid(&format!("unknown operation '{ch}'")))?;
            let op_len = len.take().ok_or_else(|| invalid("operation without length"))?;
            ops.push(CigarOp::new(kind, op_len));
        }
        if len.is_some() {
            return Err(invalid("trailing length without operation"));
        }
        Ok(Self(ops))
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "*");
        }
        for op in &self.0 {
            write!(f, "{}{}", op.len, op.kind.code())?;
        }
        Ok(())
    }
}

/// Minimal view of an aligned read needed by the locus window.
///
/// Any read-record type can be traversed once it exposes its placement and
/// edit script.
pub trait Alignment {
    /// Contig the read is aligned to.
    fn contig(&self) -> &str;

    /// First aligned reference base (1-based).
    fn alignment_start(&self) -> u64;

    /// Last aligned reference base (1-based, inclusive).
    fn alignment_end(&self) -> u64;

    /// Edit script.
    fn cigar_ops(&self) -> &[CigarOp];

    /// Number of bases in the read.
    fn read_length(&self) -> usize;

    /// Read name, used in diagnostics.
    fn read_name(&self) -> Option<&str> {
        None
    }

    /// Sample (or read group) used as the downsampling group key.
    fn sample(&self) -> Option<&str> {
        None
    }

    /// Whether the record already summarizes many reads and must never be
    /// discarded by downsampling.
    fn is_reduced(&self) -> bool {
        false
    }
}

/// Aligned read with sequence and quality information.
#[derive(Debug, Clone)]
pub struct AlignedRead {
    /// Read name.
    pub name: Arc<str>,
    /// Reference contig/chromosome name.
    pub contig: Arc<str>,
    /// 1-based leftmost aligned reference coordinate.
    pub start: u64,
    /// Mapping quality (Phred-scaled).
    pub mapq: u8,
    /// CIGAR describing the alignment.
    pub cigar: Cigar,
    /// Read sequence stored as uppercase ASCII.
    pub sequence: Arc<[u8]>,
    /// Per-base quality scores in Phred space.
    pub qualities: Arc<[u8]>,
    /// Whether the read maps to the reverse complement strand.
    pub is_reverse: bool,
    /// Sample or read-group key.
    pub sample: Option<Arc<str>>,
    /// Pre-aggregated (reduced) record.
    pub reduced: bool,
}

impl AlignedRead {
    /// Construct a new aligned read wrapper.
    pub fn new(
        contig: impl Into<Arc<str>>,
        start: u64,
        mapq: u8,
        cigar: impl Into<Cigar>,
        sequence: impl Into<Arc<[u8]>>,
        qualities: impl Into<Arc<[u8]>>,
        is_reverse: bool,
    ) -> Self {
        Self {
            name: Arc::from(""),
            contig: contig.into(),
            start,
            mapq,
            cigar: cigar.into(),
            sequence: sequence.into(),
            qualities: qualities.into(),
            is_reverse,
            sample: None,
            reduced: false,
        }
    }

    /// Set the read name.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the sample key.
    pub fn with_sample(mut self, sample: impl Into<Arc<str>>) -> Self {
        self.sample = Some(sample.into());
        self
    }

    /// Mark the record as reduced.
    pub fn with_reduced(mut self, reduced: bool) -> Self {
        self.reduced = reduced;
        self
    }

    /// Read length: the stored sequence, or the CIGAR when no sequence is kept.
    pub fn len(&self) -> usize {
        if self.sequence.is_empty() {
            self.cigar.read_length()
        } else {
            self.sequence.len()
        }
    }

    /// Whether the read carries no bases.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inclusive end position on the reference, derived from the CIGAR.
    pub fn end(&self) -> u64 {
        let span = self.cigar.reference_length();
        if span == 0 {
            self.start
        } else {
            self.start + span - 1
        }
    }

    /// Base at the provided read offset.
    pub fn base_at(&self, offset: usize) -> Option<u8> {
        self.sequence.get(offset).copied()
    }

    /// Quality score at the provided read offset.
    pub fn quality_at(&self, offset: usize) -> Option<u8> {
        self.qualities.get(offset).copied()
    }

    /// Mapping quality associated with the alignment.
    pub fn mapq(&self) -> u8 {
        self.mapq
    }
}

impl Alignment for AlignedRead {
    fn contig(&self) -> &str {
        &self.contig
    }

    fn alignment_start(&self) -> u64 {
        self.start
    }

    fn alignment_end(&self) -> u64 {
        self.end()
    }

    fn cigar_ops(&self) -> &[CigarOp] {
        self.cigar.ops()
    }

    fn read_length(&self) -> usize {
        self.len()
    }

    fn read_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn sample(&self) -> Option<&str> {
        self.sample.as_deref()
    }

    fn is_reduced(&self) -> bool {
        self.reduced
    }
}

impl<A: Alignment + ?Sized> Alignment for Arc<A> {
    fn contig(&self) -> &str {
        (**self).contig()
    }

    fn alignment_start(&self) -> u64 {
        (**self).alignment_start()
    }

    fn alignment_end(&self) -> u64 {
        (**self).alignment_end()
    }

    fn cigar_ops(&self) -> &[CigarOp] {
        (**self).cigar_ops()
    }

    fn read_length(&self) -> usize {
        (**self).read_length()
    }

    fn read_name(&self) -> Option<&str> {
        (**self).read_name()
    }

    fn sample(&self) -> Option<&str> {
        (**self).sample()
    }

    fn is_reduced(&self) -> bool {
        (**self).is_reduced()
    }
}
