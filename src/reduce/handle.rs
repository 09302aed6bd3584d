use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::ReduceError;

/// Value or failure carried by a handle.
pub type Outcome<T> = Result<T, ReduceError>;

type Continuation<T> = Box<dyn FnOnce(Outcome<T>) + Send>;

enum State<T> {
    Pending(Option<Continuation<T>>),
    Ready(Outcome<T>),
    Taken,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> Shared<T> {
    fn new(state: State<T>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            ready: Condvar::new(),
        })
    }
}

/// Write side of a handle; resolving it wakes the consumer.
///
/// Dropping an unresolved promise resolves its handle with
/// [`ReduceError::Abandoned`], so a lost producer never hangs the tree.
pub struct Promise<T> {
    shared: Option<Arc<Shared<T>>>,
}

/// Single-consumer future of a (partial) reduce result.
pub struct ReduceHandle<T> {
    shared: Arc<Shared<T>>,
}

/// Linked promise and handle.
pub fn promise<T>() -> (Promise<T>, ReduceHandle<T>) {
    let shared = Shared::new(State::Pending(None));
    (
        Promise {
            shared: Some(Arc::clone(&shared)),
        },
        ReduceHandle { shared },
    )
}

impl<T> Promise<T> {
    /// Resolve with a value.
    pub fn fulfill(self, value: T) {
        self.resolve(Ok(value));
    }

    /// Resolve with a failure.
    pub fn fail(self, error: ReduceError) {
        self.resolve(Err(error));
    }

    /// Resolve with an outcome.
    pub fn resolve(mut self, outcome: Outcome<T>) {
        if let Some(shared) = self.shared.take() {
            deliver(&shared, outcome);
        }
    }
}

fn deliver<T>(shared: &Shared<T>, outcome: Outcome<T>) {
    let mut state = shared.state.lock();
    match std::mem::replace(&mut *state, State::Taken) {
        State::Pending(Some(continuation)) => {
            drop(state);
            continuation(outcome);
        }
        State::Pending(None) => {
            *state = State::Ready(outcome);
            drop(state);
            shared.ready.notify_all();
        }
        // A promise resolves at most once.
        previous @ (State::Ready(_) | State::Taken) => *state = previous,
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            deliver(&shared, Err(ReduceError::Abandoned));
        }
    }
}

impl<T> ReduceHandle<T> {
    /// Handle that is already resolved with `value`.
    pub fn ready(value: T) -> Self {
        Self {
            shared: Shared::new(State::Ready(Ok(value))),
        }
    }

    /// Handle that is already resolved with `error`.
    pub fn failed(error: ReduceError) -> Self {
        Self {
            shared: Shared::new(State::Ready(Err(error))),
        }
    }

    /// Whether the outcome is available.
    pub fn is_ready(&self) -> bool {
        matches!(*self.shared.state.lock(), State::Ready(_))
    }

    /// Block until the outcome is available and take it.
    pub fn wait(self) -> Outcome<T> {
        let mut state = self.shared.state.lock();
        loop {
            match std::mem::replace(&mut *state, State::Taken) {
                State::Ready(outcome) => return outcome,
                State::Taken => return Err(ReduceError::ResultTaken),
                pending @ State::Pending(_) => {
                    *state = pending;
                    self.shared.ready.wait(&mut state);
                }
            }
        }
    }

    /// Run `continuation` with the outcome as soon as it is available,
    /// on whichever thread resolves the promise (or right away).
    pub(crate) fn on_ready<F>(self, continuation: F)
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        match std::mem::replace(&mut *state, State::Taken) {
            State::Ready(outcome) => {
                drop(state);
                continuation(outcome);
            }
            State::Pending(_) => {
                *state = State::Pending(Some(Box::new(continuation)));
            }
            State::Taken => {
                drop(state);
                continuation(Err(ReduceError::ResultTaken));
            }
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("resolved", &self.shared.is_none())
            .finish()
    }
}

impl<T> fmt::Debug for ReduceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.shared.state.lock() {
            State::Pending(_) => "pending",
            State::Ready(Ok(_)) => "ready",
            State::Ready(Err(_)) => "failed",
            State::Taken => "taken",
        };
        f.debug_struct("ReduceHandle").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wait_blocks_until_resolved() {
        let (promise, handle) = promise::<u32>();
        assert!(!handle.is_ready());
        let producer = thread::spawn(move || promise.fulfill(7));
        assert_eq!(handle.wait(), Ok(7));
        producer.join().unwrap();
    }

    #[test]
    fn dropped_promise_abandons_handle() {
        let (promise, handle) = promise::<u32>();
        drop(promise);
        assert_eq!(handle.wait(), Err(ReduceError::Abandoned));
    }

    #[test]
    fn continuation_runs_on_resolution() {
        let (promise, handle) = promise::<u32>();
        let (tx, rx) = std::sync::mpsc::channel();
        handle.on_ready(move |outcome| tx.send(outcome).unwrap());
        assert!(rx.try_recv().is_err());
        promise.fail(ReduceError::Abandoned);
        assert_eq!(rx.recv().unwrap(), Err(ReduceError::Abandoned));
    }
}
