//! Interval text syntax: `CONTIG`, `CONTIG:POS`, `CONTIG:START-STOP` and
//! `CONTIG:START+`, with optional `,` thousands separators.

use std::sync::Arc;

use super::{ContigOrder, GenomeLoc, IntervalError, END_OF_CONTIG};

/// Parse interval text without a sequence dictionary.
pub fn parse_loc(text: &str) -> Result<GenomeLoc, IntervalError> {
    GenomeLocParser::new(Arc::new(ContigOrder::empty())).parse(text)
}

/// Creates intervals against the run's [`ContigOrder`].
///
/// In strict mode the dictionary is treated as exhaustive: unknown contigs and
/// stops past a known contig length are consistency violations.
#[derive(Debug, Clone)]
pub struct GenomeLocParser {
    order: Arc<ContigOrder>,
    strict: bool,
}

impl GenomeLocParser {
    /// Lenient parser; unknown contigs are accepted.
    pub fn new(order: Arc<ContigOrder>) -> Self {
        Self {
            order,
            strict: false,
        }
    }

    /// Parser that validates every interval against the dictionary.
    pub fn strict(order: Arc<ContigOrder>) -> Self {
        Self {
            order,
            strict: true,
        }
    }

    /// Dictionary backing this parser.
    pub fn order(&self) -> &Arc<ContigOrder> {
        &self.order
    }

    /// Parse interval text.
    pub fn parse(&self, text: &str) -> Result<GenomeLoc, IntervalError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(IntervalError::EmptyText);
        }

        // Names such as `HLA-A*01:01` contain a colon; a dictionary hit wins.
        if self.order.contains(text) {
            return self.whole_contig(text);
        }

        let Some((contig, positions)) = text.rsplit_once(':') else {
            return self.whole_contig(text);
        };
        if contig.is_empty() {
            return Err(IntervalError::EmptyContig(text.to_string()));
        }

        let (start, stop) = if let Some(start) = positions.strip_suffix('+') {
            (parse_position(text, start)?, END_OF_CONTIG)
        } else if let Some((start, stop)) = positions.split_once('-') {
            (parse_position(text, start)?, parse_position(text, stop)?)
        } else {
            let pos = parse_position(text, positions)?;
            (pos, pos)
        };

        self.create(contig, start, stop)
    }

    /// Build and validate an interval.
    pub fn create(&self, contig: &str, start: u64, stop: u64) -> Result<GenomeLoc, IntervalError> {
        let loc = GenomeLoc::new(self.order.intern(contig), start, stop)?;
        self.validate(loc)
    }

    /// Interval spanning a whole contig.
    pub fn whole_contig(&self, contig: &str) -> Result<GenomeLoc, IntervalError> {
        self.create(contig, 1, END_OF_CONTIG)
    }

    /// Resolve open ends against known lengths and apply strict checks.
    pub fn validate(&self, loc: GenomeLoc) -> Result<GenomeLoc, IntervalError> {
        if self.strict && !self.order.contains(loc.contig()) {
            return Err(IntervalError::UnknownContig(loc.contig().to_string()));
        }
        let Some(length) = self.order.length(loc.contig()) else {
            return Ok(loc);
        };
        if loc.is_open_ended() {
            return loc.with_stop(length);
        }
        if self.strict && loc.stop() > length {
            return Err(IntervalError::PastContigEnd {
                contig: loc.contig().to_string(),
                stop: loc.stop(),
                length,
            });
        }
        Ok(loc)
    }
}

fn parse_position(text: &str, token: &str) -> Result<u64, IntervalError> {
    let invalid = || IntervalError::InvalidPosition {
        text: text.to_string(),
        value: token.to_string(),
    };

    let well_formed = !token.is_empty()
        && !token.starts_with(',')
        && !token.ends_with(',')
        && !token.contains(",,")
        && token.bytes().all(|b| b.is_ascii_digit() || b == b',');
    if !well_formed {
        return Err(invalid());
    }

    token
        .bytes()
        .filter(|&b| b != b',')
        .try_fold(0u64, |acc, b| acc.checked_mul(10)?.checked_add(u64::from(b - b'0')))
        .ok_or_else(invalid)
}
