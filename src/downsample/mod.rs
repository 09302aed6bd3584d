//! Bounded, fairness-preserving downsampling
//!
//! Downsamplers accept items, remove some of them, and hand the survivors
//! back. The leveling downsampler works on groups (one per sample) and trims
//! the largest groups first so every group ends up with a near-equal share.

mod leveling;

pub use leveling::LevelingDownsampler;

/// Common interface for downsamplers.
///
/// Items go in through [`submit`](Downsampler::submit); the ones that survive
/// become available from [`consume_finalized_items`](Downsampler::consume_finalized_items)
/// once the downsampler has made its final decision about them.
pub trait Downsampler<T> {
    /// Submit one item.
    fn submit(&mut self, item: T);

    /// Submit every item of `items`.
    fn submit_all<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
        Self: Sized,
    {
        for item in items {
            self.submit(item);
        }
    }

    /// Whether surviving items are ready to be consumed.
    fn has_finalized_items(&self) -> bool;

    /// Take all surviving items decided so far.
    fn consume_finalized_items(&mut self) -> Vec<T>;

    /// Whether submitted items still await a decision.
    fn has_pending_items(&self) -> bool;

    /// No more items will arrive; decide everything that is pending.
    fn signal_end_of_input(&mut self);

    /// Items discarded since construction or the last [`reset_stats`](Downsampler::reset_stats).
    fn discarded(&self) -> u64;

    /// Reset the discard counter. Items already handed out are unaffected.
    fn reset_stats(&mut self);

    /// Drop pending and finalized items without touching statistics.
    fn clear(&mut self);
}

/// Downsampler that keeps everything.
#[derive(Debug)]
pub struct PassThroughDownsampler<T> {
    items: Vec<T>,
}

impl<T> PassThroughDownsampler<T> {
    /// Create an empty pass-through downsampler.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Default for PassThroughDownsampler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Downsampler<T> for PassThroughDownsampler<T> {
    fn submit(&mut self, item: T) {
        self.items.push(item);
    }

    fn has_finalized_items(&self) -> bool {
        !self.items.is_empty()
    }

    fn consume_finalized_items(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }

    fn has_pending_items(&self) -> bool {
        false
    }

    fn signal_end_of_input(&mut self) {}

    fn discarded(&self) -> u64 {
        0
    }

    fn reset_stats(&mut self) {}

    fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_through_keeps_everything() {
        let mut ds = PassThroughDownsampler::new();
        ds.submit_all(0..10);
        ds.signal_end_of_input();
        assert!(ds.has_finalized_items());
        assert_eq!(ds.consume_finalized_items(), (0..10).collect::<Vec<_>>());
        assert_eq!(ds.discarded(), 0);
        assert!(!ds.has_finalized_items());
    }
}
