//! Order-preserving asynchronous reduction
//!
//! Shard results arrive as [`ReduceHandle`]s in genome order and are combined
//! pairwise as soon as both inputs resolve, like a binary counter:
//!
//! ```text
//! [1, 2, 3, 4] -> c(c(1, 2), c(3, 4))
//! [1, 2, 3]    -> c(c(1, 2), 3)
//! ```
//!
//! The left operand is always the earlier entry, so any associative combine
//! gives the same result as a sequential left fold, however the leaves are
//! scheduled. Combines run on a rayon pool; nothing blocks except
//! [`ReduceTree::result`].

mod handle;

pub use handle::{promise, Outcome, Promise, ReduceHandle};

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{trace, warn};

use crate::shard::ShardId;

/// Reduction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    /// `result` was called before `complete`.
    #[error("reduce tree is not complete")]
    NotComplete,

    /// Entry added after `complete`.
    #[error("reduce tree is already complete")]
    AlreadyComplete,

    /// The result was already consumed.
    #[error("reduce result was already taken")]
    ResultTaken,

    /// A leaf failed.
    #[error("shard {shard} failed: {message}")]
    ShardFailed {
        /// Failing shard.
        shard: ShardId,
        /// Failure description.
        message: String,
    },

    /// The combine function panicked.
    #[error("combine panicked: {message}")]
    CombinePanicked {
        /// Panic payload, when it was a string.
        message: String,
    },

    /// A promise was dropped without being resolved.
    #[error("a pending result was abandoned before it resolved")]
    Abandoned,
}

/// Where combines run.
#[derive(Debug, Clone, Default)]
pub enum Spawner {
    /// rayon's global pool.
    #[default]
    Global,
    /// A dedicated pool.
    Pool(Arc<rayon::ThreadPool>),
}

impl Spawner {
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Spawner::Global => rayon::spawn(job),
            Spawner::Pool(pool) => pool.spawn(job),
        }
    }
}

struct Inner<T> {
    // levels[i] holds a pending node covering 2^i entries, if any.
    levels: Vec<Option<ReduceHandle<T>>>,
    entries: usize,
    completed: bool,
    root: Option<ReduceHandle<T>>,
    taken: bool,
}

/// Binary reduction tree over asynchronously produced values.
pub struct ReduceTree<T, F> {
    combine: Arc<F>,
    spawner: Spawner,
    inner: Mutex<Inner<T>>,
}

impl<T, F> fmt::Debug for ReduceTree<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ReduceTree")
            .field("entries", &inner.entries)
            .field("completed", &inner.completed)
            .field("spawner", &self.spawner)
            .finish()
    }
}

impl<T, F> ReduceTree<T, F>
where
    T: Send + 'static,
    F: Fn(T, T) -> T + Send + Sync + 'static,
{
    /// Tree combining with `combine` on rayon's global pool.
    pub fn new(combine: F) -> Self {
        Self::with_spawner(combine, Spawner::Global)
    }

    /// Tree combining on the given pool.
    pub fn with_spawner(combine: F, spawner: Spawner) -> Self {
        Self {
            combine: Arc::new(combine),
            spawner,
            inner: Mutex::new(Inner {
                levels: Vec::new(),
                entries: 0,
                completed: false,
                root: None,
                taken: false,
            }),
        }
    }

    /// Entries added so far.
    pub fn len(&self) -> usize {
        self.inner.lock().entries
    }

    /// Whether no entry was added.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `complete` was called.
    pub fn is_complete(&self) -> bool {
        self.inner.lock().completed
    }

    /// Append the next entry in order.
    pub fn add_entry(&self, handle: ReduceHandle<T>) -> Result<(), ReduceError> {
        let mut inner = self.inner.lock();
        if inner.completed {
            return Err(ReduceError::AlreadyComplete);
        }
        inner.entries += 1;

        let mut carry = handle;
        let mut level = 0;
        loop {
            if inner.levels.len() == level {
                inner.levels.push(None);
            }
            match inner.levels[level].take() {
                None => {
                    inner.levels[level] = Some(carry);
                    break;
                }
                Some(earlier) => {
                    carry = self.join(earlier, carry);
                    level += 1;
                }
            }
        }
        Ok(())
    }

    /// No more entries; fold the leftover partial nodes into the root.
    pub fn complete(&self) {
        let mut inner = self.inner.lock();
        if inner.completed {
            return;
        }
        inner.completed = true;

        let mut carry: Option<ReduceHandle<T>> = None;
        let levels = std::mem::take(&mut inner.levels);
        for slot in levels {
            carry = match (slot, carry) {
                (Some(earlier), Some(later)) => Some(self.join(earlier, later)),
                (Some(node), None) | (None, Some(node)) => Some(node),
                (None, None) => None,
            };
        }
        inner.root = carry;
        trace!(entries = inner.entries, "reduce tree complete");
    }

    /// Block until the root resolves.
    ///
    /// Returns `Ok(None)` when no entry was ever added and the single entry
    /// unchanged when only one was.
    pub fn result(&self) -> Result<Option<T>, ReduceError> {
        let root = {
            let mut inner = self.inner.lock();
            if !inner.completed {
                return Err(ReduceError::NotComplete);
            }
            if inner.taken {
                return Err(ReduceError::ResultTaken);
            }
            inner.taken = true;
            inner.root.take()
        };
        match root {
            None => Ok(None),
            Some(handle) => handle.wait().map(Some),
        }
    }

    // Node resolving to combine(lhs, rhs) once both inputs have resolved.
    fn join(&self, lhs: ReduceHandle<T>, rhs: ReduceHandle<T>) -> ReduceHandle<T> {
        let (promise, node) = promise();
        let join = Arc::new(Join {
            state: Mutex::new(JoinState {
                lhs: None,
                rhs: None,
                promise: Some(promise),
            }),
            combine: Arc::clone(&self.combine),
            spawner: self.spawner.clone(),
        });

        let left = Arc::clone(&join);
        lhs.on_ready(move |outcome| left.arrive(Side::Left, outcome));
        rhs.on_ready(move |outcome| join.arrive(Side::Right, outcome));
        node
    }
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

struct JoinState<T> {
    lhs: Option<Outcome<T>>,
    rhs: Option<Outcome<T>>,
    promise: Option<Promise<T>>,
}

struct Join<T, F> {
    state: Mutex<JoinState<T>>,
    combine: Arc<F>,
    spawner: Spawner,
}

impl<T, F> Join<T, F>
where
    T: Send + 'static,
    F: Fn(T, T) -> T + Send + Sync + 'static,
{
    fn arrive(&self, side: Side, outcome: Outcome<T>) {
        let ready = {
            let mut state = self.state.lock();
            match side {
                Side::Left => state.lhs = Some(outcome),
                Side::Right => state.rhs = Some(outcome),
            }
            if state.lhs.is_some() && state.rhs.is_some() {
                match (state.lhs.take(), state.rhs.take(), state.promise.take()) {
                    (Some(lhs), Some(rhs), Some(promise)) => Some((lhs, rhs, promise)),
                    _ => None,
                }
            } else {
                None
            }
        };

        let Some((lhs, rhs, promise)) = ready else {
            return;
        };
        let combine = Arc::clone(&self.combine);
        self.spawner.spawn(move || {
            let outcome = match (lhs, rhs) {
                (Ok(lhs), Ok(rhs)) => catch_unwind(AssertUnwindSafe(|| (*combine)(lhs, rhs)))
                    .map_err(|payload| {
                        let message = panic_message(payload.as_ref());
                        warn!(%message, "combine panicked");
                        ReduceError::CombinePanicked { message }
                    }),
                // The earlier failure wins.
                (Err(err), _) | (Ok(_), Err(err)) => Err(err),
            };
            promise.resolve(outcome);
        });
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
