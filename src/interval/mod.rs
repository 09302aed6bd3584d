//! Genome interval model
//!
//! Closed, 1-based intervals on named contigs. Ordering is driven by an
//! explicit [`ContigOrder`] (the sequence dictionary of the run) rather than
//! by the contig names themselves.

mod contig_order;
mod loc;
mod parser;
mod set;

pub use contig_order::{ContigOrder, ContigRecord};
pub use loc::{GenomeLoc, END_OF_CONTIG};
pub use parser::{parse_loc, GenomeLocParser};
pub use set::GenomeLocSet;

use thiserror::Error;

/// Errors raised while building, parsing, or combining intervals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    /// Empty interval text.
    #[error("interval text is empty")]
    EmptyText,

    /// Contig name missing.
    #[error("contig name is empty in '{0}'")]
    EmptyContig(String),

    /// A position could not be parsed.
    #[error("invalid position '{value}' in interval '{text}'")]
    InvalidPosition {
        /// Full interval text being parsed.
        text: String,
        /// Offending position token.
        value: String,
    },

    /// Start lies after stop.
    #[error("start {start} is greater than stop {stop} on {contig}")]
    StartAfterStop {
        /// Contig of the interval.
        contig: String,
        /// Requested start.
        start: u64,
        /// Requested stop.
        stop: u64,
    },

    /// Positions are 1-based.
    #[error("start must be >= 1 on {contig} (got {start})")]
    StartBelowOne {
        /// Contig of the interval.
        contig: String,
        /// Requested start.
        start: u64,
    },

    /// Contig absent from a dictionary that is expected to be exhaustive.
    #[error("contig '{0}' is not present in the sequence dictionary")]
    UnknownContig(String),

    /// Stop lies past the known end of the contig.
    #[error("stop {stop} is past the end of {contig} (length {length})")]
    PastContigEnd {
        /// Contig of the interval.
        contig: String,
        /// Requested stop.
        stop: u64,
        /// Dictionary length of the contig.
        length: u64,
    },

    /// A contig appears twice in a dictionary.
    #[error("contig '{0}' appears more than once in the sequence dictionary")]
    DuplicateContig(String),

    /// Operation requires both intervals on one contig.
    #[error("intervals {lhs} and {rhs} are on different contigs")]
    DifferentContigs {
        /// Left-hand interval.
        lhs: String,
        /// Right-hand interval.
        rhs: String,
    },

    /// Merge requires overlapping or adjacent intervals.
    #[error("intervals {lhs} and {rhs} are neither overlapping nor adjacent")]
    NotContiguous {
        /// Left-hand interval.
        lhs: String,
        /// Right-hand interval.
        rhs: String,
    },

    /// Coordinate arithmetic left the representable range.
    #[error("shifting {loc} by {by} leaves the valid coordinate range")]
    ShiftOutOfRange {
        /// Interval being shifted.
        loc: String,
        /// Requested shift.
        by: i64,
    },
}
