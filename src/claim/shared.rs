use std::cell::RefCell;
use std::collections::HashMap;

use parking_lot::ReentrantMutex;
use tracing::trace;

use super::{ClaimError, ClaimRegistry, ProcessingLoc};
use crate::interval::GenomeLoc;

#[derive(Debug, Default)]
struct State {
    winners: HashMap<GenomeLoc, ProcessingLoc>,
    log: Vec<ProcessingLoc>,
    polled: usize,
}

/// In-process registry shared by the workers of one run.
///
/// The lock is reentrant so that `claim` can check and register under one
/// acquisition; it is held only while the log is appended to or drained.
#[derive(Debug, Default)]
pub struct SharedMemoryClaimRegistry {
    state: ReentrantMutex<RefCell<State>>,
}

impl SharedMemoryClaimRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records registered, duplicates included.
    pub fn len(&self) -> usize {
        self.state.lock().borrow().log.len()
    }

    /// Whether nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ClaimRegistry for SharedMemoryClaimRegistry {
    fn register(&self, claims: Vec<ProcessingLoc>) -> Result<(), ClaimError> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        for claim in claims {
            state
                .winners
                .entry(claim.loc().clone())
                .or_insert_with(|| claim.clone());
            state.log.push(claim);
        }
        Ok(())
    }

    fn poll_new(&self) -> Result<Vec<ProcessingLoc>, ClaimError> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let fresh = state.log[state.polled..].to_vec();
        state.polled = state.log.len();
        Ok(fresh)
    }

    fn owner_of(&self, loc: &GenomeLoc) -> Result<Option<ProcessingLoc>, ClaimError> {
        let guard = self.state.lock();
        let winner = guard.borrow().winners.get(loc).cloned();
        Ok(winner)
    }

    fn claim(&self, loc: &GenomeLoc, owner: &str) -> Result<ProcessingLoc, ClaimError> {
        let _guard = self.state.lock();
        if let Some(existing) = self.owner_of(loc)? {
            trace!(%loc, owner, winner = existing.owner(), "interval already claimed");
            return Ok(existing);
        }
        let claim = ProcessingLoc::new(loc.clone(), owner)?;
        self.register(vec![claim.clone()])?;
        Ok(claim)
    }
}
