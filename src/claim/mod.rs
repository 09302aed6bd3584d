//! Cooperative work claiming
//!
//! Workers that share a registry record which intervals they are processing
//! so that no interval is processed twice. The first claimant of an interval
//! owns it; later claimants are told who won.

mod shared;

pub use shared::SharedMemoryClaimRegistry;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::interval::GenomeLoc;

/// Claim registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// Owners must be identifiable.
    #[error("claim owner must not be empty (claiming {loc})")]
    EmptyOwner {
        /// Interval being claimed.
        loc: String,
    },

    /// Registry backend failure.
    #[error("claim registry unavailable: {0}")]
    Unavailable(String),
}

/// Claim of an interval by one worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessingLoc {
    loc: GenomeLoc,
    owner: String,
    timestamp_ms: u64,
}

impl ProcessingLoc {
    /// Claim stamped with the current wall-clock time.
    pub fn new(loc: GenomeLoc, owner: impl Into<String>) -> Result<Self, ClaimError> {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0);
        Self::at(loc, owner, timestamp_ms)
    }

    /// Claim with an explicit timestamp (milliseconds since the epoch).
    pub fn at(
        loc: GenomeLoc,
        owner: impl Into<String>,
        timestamp_ms: u64,
    ) -> Result<Self, ClaimError> {
        let owner = owner.into();
        if owner.is_empty() {
            return Err(ClaimError::EmptyOwner { loc: loc.to_string() });
        }
        Ok(Self {
            loc,
            owner,
            timestamp_ms,
        })
    }

    /// Claimed interval.
    pub fn loc(&self) -> &GenomeLoc {
        &self.loc
    }

    /// Claiming worker.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Claim time in milliseconds since the epoch.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Whether `owner` made this claim.
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner == owner
    }
}

impl fmt::Display for ProcessingLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {} at {}", self.loc, self.owner, self.timestamp_ms)
    }
}

/// Shared record of which intervals are being processed, and by whom.
pub trait ClaimRegistry: Send + Sync + fmt::Debug {
    /// Record claims. Every record becomes visible to [`poll_new`](Self::poll_new),
    /// including duplicates; ownership stays with the first claimant.
    fn register(&self, claims: Vec<ProcessingLoc>) -> Result<(), ClaimError>;

    /// Records registered since the previous poll, each returned exactly once.
    fn poll_new(&self) -> Result<Vec<ProcessingLoc>, ClaimError>;

    /// Winning claim for `loc`, if any.
    fn owner_of(&self, loc: &GenomeLoc) -> Result<Option<ProcessingLoc>, ClaimError>;

    /// Claim `loc` for `owner`; returns the winning claim, which belongs to
    /// someone else when `loc` was already taken.
    fn claim(&self, loc: &GenomeLoc, owner: &str) -> Result<ProcessingLoc, ClaimError>;

    /// Whether anyone claimed `loc`.
    fn is_claimed(&self, loc: &GenomeLoc) -> Result<bool, ClaimError> {
        Ok(self.owner_of(loc)?.is_some())
    }

    /// Claim the first candidate nobody else owns.
    fn claim_next_available(
        &self,
        candidates: &[GenomeLoc],
        owner: &str,
    ) -> Result<Option<GenomeLoc>, ClaimError> {
        for loc in candidates {
            if self.is_claimed(loc)? {
                continue;
            }
            if self.claim(loc, owner)?.is_owned_by(owner) {
                return Ok(Some(loc.clone()));
            }
        }
        Ok(None)
    }
}

/// Registry for single-process runs: nothing is ever claimed, so every
/// claim succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopClaimRegistry;

impl ClaimRegistry for NoopClaimRegistry {
    fn register(&self, _claims: Vec<ProcessingLoc>) -> Result<(), ClaimError> {
        Ok(())
    }

    fn poll_new(&self) -> Result<Vec<ProcessingLoc>, ClaimError> {
        Ok(Vec::new())
    }

    fn owner_of(&self, _loc: &GenomeLoc) -> Result<Option<ProcessingLoc>, ClaimError> {
        Ok(None)
    }

    fn claim(&self, loc: &GenomeLoc, owner: &str) -> Result<ProcessingLoc, ClaimError> {
        ProcessingLoc::new(loc.clone(), owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(start: u64) -> GenomeLoc {
        GenomeLoc::new("chr1", start, start + 9).unwrap()
    }

    #[test]
    fn noop_registry_never_remembers() {
        let registry = NoopClaimRegistry;
        registry
            .register(vec![ProcessingLoc::new(loc(1), "a").unwrap()])
            .unwrap();
        assert!(registry.poll_new().unwrap().is_empty());
        assert!(!registry.is_claimed(&loc(1)).unwrap());
        assert!(registry.claim(&loc(1), "b").unwrap().is_owned_by("b"));
        assert_eq!(
            registry.claim_next_available(&[loc(1), loc(11)], "c").unwrap(),
            Some(loc(1))
        );
    }

    #[test]
    fn empty_owner_is_rejected() {
        assert!(matches!(
            ProcessingLoc::new(loc(1), ""),
            Err(ClaimError::EmptyOwner { .. })
        ));
    }
}
