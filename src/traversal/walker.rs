use std::fmt;
use std::marker::PhantomData;

use thiserror::Error;

use crate::genomics::LocusView;

/// Failure reported by walker code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("walker failed: {0}")]
pub struct WalkerError(String);

impl WalkerError {
    /// Walker failure with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Analysis run once per covered reference position.
///
/// Each shard starts from [`init`](LocusWalker::init) and folds every
/// mapped locus in with [`combine`](LocusWalker::combine); shard results are
/// then combined again in genome order. `combine` must be associative, and
/// `init` its identity, for the result not to depend on sharding.
pub trait LocusWalker<R>: Send + Sync + 'static {
    /// Per-locus and accumulated value.
    type Value: Send + 'static;

    /// Identity value each shard starts from.
    fn init(&self) -> Self::Value;

    /// Whether a read may contribute to pileups.
    fn filter(&self, _read: &R) -> bool {
        true
    }

    /// Value for one locus.
    fn map(&self, locus: &LocusView<R>) -> Result<Self::Value, WalkerError>;

    /// Merge an earlier value with a later one.
    fn combine(&self, earlier: Self::Value, later: Self::Value) -> Self::Value;
}

/// Analysis run once per read.
pub trait ReadWalker<R>: Send + Sync + 'static {
    /// Per-read and accumulated value.
    type Value: Send + 'static;

    /// Identity value each shard starts from.
    fn init(&self) -> Self::Value;

    /// Whether the read should be visited.
    fn filter(&self, _read: &R) -> bool {
        true
    }

    /// Value for one read.
    fn map(&self, read: &R) -> Result<Self::Value, WalkerError>;

    /// Merge an earlier value with a later one.
    fn combine(&self, earlier: Self::Value, later: Self::Value) -> Self::Value;
}

/// Locus walker assembled from closures.
pub struct FnLocusWalker<R, V, I, M, C> {
    init: I,
    map: M,
    combine: C,
    _types: PhantomData<fn(&R) -> V>,
}

impl<R, V, I, M, C> FnLocusWalker<R, V, I, M, C>
where
    I: Fn() -> V,
    M: Fn(&LocusView<R>) -> V,
    C: Fn(V, V) -> V,
{
    /// Walker from an identity, a per-locus map and an associative combine.
    pub fn new(init: I, map: M, combine: C) -> Self {
        Self {
            init,
            map,
            combine,
            _types: PhantomData,
        }
    }
}

impl<R, V, I, M, C> fmt::Debug for FnLocusWalker<R, V, I, M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnLocusWalker").finish_non_exhaustive()
    }
}

impl<R, V, I, M, C> LocusWalker<R> for FnLocusWalker<R, V, I, M, C>
where
    R: 'static,
    V: Send + 'static,
    I: Fn() -> V + Send + Sync + 'static,
    M: Fn(&LocusView<R>) -> V + Send + Sync + 'static,
    C: Fn(V, V) -> V + Send + Sync + 'static,
{
    type Value = V;

    fn init(&self) -> V {
        (self.init)()
    }

    fn map(&self, locus: &LocusView<R>) -> Result<V, WalkerError> {
        Ok((self.map)(locus))
    }

    fn combine(&self, earlier: V, later: V) -> V {
        (self.combine)(earlier, later)
    }
}

/// Read walker assembled from closures.
pub struct FnReadWalker<R, V, I, M, C> {
    init: I,
    map: M,
    combine: C,
    _types: PhantomData<fn(&R) -> V>,
}

impl<R, V, I, M, C> FnReadWalker<R, V, I, M, C>
where
    I: Fn() -> V,
    M: Fn(&R) -> V,
    C: Fn(V, V) -> V,
{
    /// Walker from an identity, a per-read map and an associative combine.
    pub fn new(init: I, map: M, combine: C) -> Self {
        Self {
            init,
            map,
            combine,
            _types: PhantomData,
        }
    }
}

impl<R, V, I, M, C> fmt::Debug for FnReadWalker<R, V, I, M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnReadWalker").finish_non_exhaustive()
    }
}

impl<R, V, I, M, C> ReadWalker<R> for FnReadWalker<R, V, I, M, C>
where
    R: 'static,
    V: Send + 'static,
    I: Fn() -> V + Send + Sync + 'static,
    M: Fn(&R) -> V + Send + Sync + 'static,
    C: Fn(V, V) -> V + Send + Sync + 'static,
{
    type Value = V;

    fn init(&self) -> V {
        (self.init)()
    }

    fn map(&self, read: &R) -> Result<V, WalkerError> {
        Ok((self.map)(read))
    }

    fn combine(&self, earlier: V, later: V) -> V {
        (self.combine)(earlier, later)
    }
}
