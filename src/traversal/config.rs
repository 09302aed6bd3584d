use std::sync::Arc;

use crate::interval::ContigOrder;
use crate::shard::Sharder;
use crate::TraversalError;

/// Default maximum shard size in bases.
pub const DEFAULT_SHARD_SIZE: u64 = 16_384;

/// Default claim owner for single-process runs.
pub const DEFAULT_OWNER: &str = "local";

/// Settings for one traversal run.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Contig ranking (with lengths) shared by every component.
    pub order: Arc<ContigOrder>,
    /// Maximum bases per shard.
    pub max_shard_size: u64,
    /// Worker threads; 0 lets rayon decide.
    pub threads: usize,
    /// Per-locus coverage target for downsampling, if any.
    pub downsample_to: Option<usize>,
    /// Identity used when claiming shards.
    pub owner: String,
    /// Report reads that skip a locus (`N`) in pileups.
    pub include_skips: bool,
}

impl TraversalConfig {
    /// Defaults over the given contig table.
    pub fn new(order: Arc<ContigOrder>) -> Self {
        Self {
            order,
            max_shard_size: DEFAULT_SHARD_SIZE,
            threads: 0,
            downsample_to: None,
            owner: DEFAULT_OWNER.to_string(),
            include_skips: false,
        }
    }

    /// Set the maximum shard size.
    pub fn with_max_shard_size(mut self, max_shard_size: u64) -> Result<Self, TraversalError> {
        if max_shard_size == 0 {
            return Err(TraversalError::InvalidConfiguration(
                "max shard size must be > 0".to_string(),
            ));
        }
        self.max_shard_size = max_shard_size;
        Ok(self)
    }

    /// Set the worker thread count (0 lets rayon decide).
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Level pileups deeper than `target` reads.
    pub fn with_downsampling(mut self, target: usize) -> Self {
        self.downsample_to = Some(target);
        self
    }

    /// Set the claim owner id.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Result<Self, TraversalError> {
        let owner = owner.into();
        if owner.is_empty() {
            return Err(TraversalError::InvalidConfiguration(
                "owner id must not be empty".to_string(),
            ));
        }
        self.owner = owner;
        Ok(self)
    }

    /// Include reads that skip a locus in pileups.
    pub fn with_skips(mut self, include: bool) -> Self {
        self.include_skips = include;
        self
    }

    /// Check settings that may have been assigned directly.
    pub fn validate(&self) -> Result<(), TraversalError> {
        if self.max_shard_size == 0 {
            return Err(TraversalError::InvalidConfiguration(
                "max shard size must be > 0".to_string(),
            ));
        }
        if self.owner.is_empty() {
            return Err(TraversalError::InvalidConfiguration(
                "owner id must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Sharder honoring `max_shard_size`.
    pub fn sharder(&self) -> Result<Sharder, TraversalError> {
        Ok(Sharder::new(self.max_shard_size)?)
    }
}
