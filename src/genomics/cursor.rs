//! Per-read alignment cursor
//!
//! Walks a read's edit script one reference base at a time. Each call to
//! [`AlignmentCursor::step_forward`] lands on the next reference position and
//! reports the operation covering it; insertions, clips and padding that sit
//! between two reference positions are consumed on the way.

use super::{Alignment, CigarError, CigarOp, CigarOpKind};

/// Cursor over one read's CIGAR.
///
/// `read_offset` and `genome_offset` start at `-1` (before the first base).
/// `read_offset` only grows on `M`/`I`/`S`, `genome_offset` only on `M`/`D`/`N`.
#[derive(Debug, Clone)]
pub struct AlignmentCursor {
    ops: Vec<CigarOp>,
    alignment_start: u64,
    read_offset: i32,
    genome_offset: i32,
    current: Option<usize>,
    op_offset: i64,
    done: bool,
}

impl AlignmentCursor {
    /// Create a cursor for an edit script aligned at `alignment_start`.
    ///
    /// Fails when the script is empty, places no base on the reference, or
    /// begins or ends its reference span with a gap (`D`/`N`).
    pub fn new(ops: &[CigarOp], alignment_start: u64) -> Result<Self, CigarError> {
        validate(ops)?;
        Ok(Self {
            ops: ops.to_vec(),
            alignment_start,
            read_offset: -1,
            genome_offset: -1,
            current: None,
            op_offset: -1,
            done: false,
        })
    }

    /// Cursor for any [`Alignment`].
    pub fn for_read<A: Alignment + ?Sized>(read: &A) -> Result<Self, CigarError> {
        Self::new(read.cigar_ops(), read.alignment_start())
    }

    /// Advance to the next reference base.
    ///
    /// Returns the operation covering the new position (`Match`, `Deletion`
    /// or `Skip`), or `None` once the script is exhausted.
    pub fn step_forward(&mut self) -> Option<CigarOpKind> {
        if self.done {
            return None;
        }

        loop {
            let exhausted = match self.current {
                None => true,
                Some(idx) => self.op_offset + 1 >= i64::from(self.ops[idx].len),
            };
            if exhausted {
                let next = self.current.map_or(0, |idx| idx + 1);
                if next >= self.ops.len() {
                    self.done = true;
                    self.current = None;
                    return None;
                }
                self.current = Some(next);
                self.op_offset = -1;
                continue;
            }

            let Some(idx) = self.current else {
                continue;
            };
            let op = self.ops[idx];
            self.op_offset += 1;

            match op.kind {
                CigarOpKind::HardClip | CigarOpKind::Padding => {
                    self.op_offset = i64::from(op.len) - 1;
                }
                CigarOpKind::Insertion | CigarOpKind::SoftClip => {
                    self.read_offset += op.len as i32;
                    self.op_offset = i64::from(op.len) - 1;
                }
                CigarOpKind::Deletion | CigarOpKind::Skip => {
                    self.genome_offset += 1;
                    return Some(op.kind);
                }
                CigarOpKind::Match => {
                    self.read_offset += 1;
                    self.genome_offset += 1;
                    return Some(op.kind);
                }
            }
        }
    }

    /// Offset of the current read base (`-1` before the first step). On a
    /// deletion this is the last read base before the gap.
    pub fn read_offset(&self) -> i32 {
        self.read_offset
    }

    /// Reference bases stepped past the alignment start (`-1` before the
    /// first step).
    pub fn genome_offset(&self) -> i32 {
        self.genome_offset
    }

    /// Reference position under the cursor, once stepped.
    pub fn genome_position(&self) -> Option<u64> {
        u64::try_from(self.genome_offset)
            .ok()
            .map(|offset| self.alignment_start + offset)
    }

    /// First aligned reference base.
    pub fn alignment_start(&self) -> u64 {
        self.alignment_start
    }

    /// Whether the script is fully consumed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Operation under the cursor.
    pub fn current_op(&self) -> Option<CigarOp> {
        self.current.map(|idx| self.ops[idx])
    }

    /// Offset into the current operation.
    pub fn op_offset(&self) -> Option<u32> {
        self.current.and_then(|_| u32::try_from(self.op_offset).ok())
    }

    /// Operation adjacent to the current base in the forward direction:
    /// the next operation when on the last base of the current one,
    /// otherwise the current one. Does not move the cursor.
    pub fn peek_forward(&self) -> Option<CigarOp> {
        let idx = self.current?;
        let op = self.ops[idx];
        if self.op_offset + 1 < i64::from(op.len) {
            return Some(op);
        }
        self.ops[idx + 1..].iter().copied().find(|op| op.len > 0)
    }

    /// Operation adjacent to the current base in the backward direction:
    /// the previous operation when on the first base of the current one,
    /// otherwise the current one. Does not move the cursor.
    pub fn peek_backward(&self) -> Option<CigarOp> {
        let idx = self.current?;
        let op = self.ops[idx];
        if self.op_offset > 0 {
            return Some(op);
        }
        self.ops[..idx].iter().rev().copied().find(|op| op.len > 0)
    }

    /// An insertion starts right after the current base.
    pub fn is_before_insertion(&self) -> bool {
        self.peek_forward()
            .is_some_and(|op| op.kind == CigarOpKind::Insertion)
    }

    /// An insertion ends right before the current base.
    pub fn is_after_insertion(&self) -> bool {
        self.peek_backward()
            .is_some_and(|op| op.kind == CigarOpKind::Insertion)
    }

    /// The current base is aligned and a deletion follows it.
    pub fn is_before_deletion(&self) -> bool {
        self.current_op()
            .is_some_and(|op| op.kind == CigarOpKind::Match)
            && self
                .peek_forward()
                .is_some_and(|op| op.kind == CigarOpKind::Deletion)
    }

    /// The current base is aligned and a deletion precedes it.
    pub fn is_after_deletion(&self) -> bool {
        self.current_op()
            .is_some_and(|op| op.kind == CigarOpKind::Match)
            && self
                .peek_backward()
                .is_some_and(|op| op.kind == CigarOpKind::Deletion)
    }
}

fn validate(ops: &[CigarOp]) -> Result<(), CigarError> {
    if ops.is_empty() {
        return Err(CigarError::Empty);
    }

    let mut reference_ops = ops
        .iter()
        .filter(|op| op.kind.consumes_reference() && op.len > 0);
    let first = reference_ops.next().ok_or(CigarError::NoReferenceBases)?;
    let last = reference_ops.last().unwrap_or(first);
    if first.kind.is_gap() {
        return Err(CigarError::LeadingGap(first.kind));
    }
    if last.kind.is_gap() {
        return Err(CigarError::TrailingGap(last.kind));
    }

    let read_bases: u64 = ops
        .iter()
        .filter(|op| op.kind.consumes_read())
        .map(|op| u64::from(op.len))
        .sum();
    if read_bases > i32::MAX as u64 {
        return Err(CigarError::ReadTooLong(read_bases));
    }
    Ok(())
}
