/// Iterator adapter that can look ahead and give items back.
///
/// Items returned with [`unget`](PushbackIterator::unget) are yielded again,
/// most recently returned first, before the underlying iterator is touched.
#[derive(Debug)]
pub struct PushbackIterator<I: Iterator> {
    inner: I,
    pushed: Vec<I::Item>,
}

impl<I: Iterator> PushbackIterator<I> {
    /// Wrap an iterator.
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            pushed: Vec::new(),
        }
    }

    /// Next item without consuming it.
    pub fn peek(&mut self) -> Option<&I::Item> {
        if self.pushed.is_empty() {
            let item = self.inner.next()?;
            self.pushed.push(item);
        }
        self.pushed.last()
    }

    /// Give an item back; it will be the next one yielded.
    pub fn unget(&mut self, item: I::Item) {
        self.pushed.push(item);
    }

    /// Consume the next item only if `accept` approves of it.
    pub fn next_if(&mut self, accept: impl FnOnce(&I::Item) -> bool) -> Option<I::Item> {
        let item = self.next()?;
        if accept(&item) {
            Some(item)
        } else {
            self.unget(item);
            None
        }
    }
}

impl<I: Iterator> Iterator for PushbackIterator<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.pushed.pop().or_else(|| self.inner.next())
    }
}
