//! Read-level genomics primitives: CIGAR edit scripts, aligned reads, the
//! per-read alignment cursor, and pileup views.

mod cursor;
mod pileup;
mod types;

pub use cursor::AlignmentCursor;
pub use pileup::{BaseCounts, LocusView, PileupElement};
pub use types::{AlignedRead, Alignment, Cigar, CigarOp, CigarOpKind};

use thiserror::Error;

/// Malformed edit scripts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CigarError {
    /// No operations at all.
    #[error("edit script is empty")]
    Empty,

    /// No operation places a base on the reference.
    #[error("edit script does not consume any reference bases")]
    NoReferenceBases,

    /// Reference span begins with a gap.
    #[error("edit script begins its reference span with a {0:?} gap")]
    LeadingGap(CigarOpKind),

    /// Reference span ends with a gap.
    #[error("edit script ends its reference span with a {0:?} gap")]
    TrailingGap(CigarOpKind),

    /// Read too long for 32-bit offsets.
    #[error("edit script describes {0} read bases, more than a cursor can address")]
    ReadTooLong(u64),

    /// CIGAR text could not be parsed.
    #[error("invalid CIGAR '{text}': {reason}")]
    InvalidText {
        /// Offending CIGAR text.
        text: String,
        /// What went wrong.
        reason: String,
    },
}
