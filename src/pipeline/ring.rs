//! Fixed-capacity circular queue with a drop-oldest overflow policy
//!
//! The ring has no synchronization of its own; `FramePipeline` guards it
//! with a mutex.

/// Circular FIFO of at most `capacity` entries.
///
/// Pushing into a full ring evicts the logically oldest entry instead of
/// failing. Popping or peeking an empty ring yields `None`.
#[derive(Debug)]
pub struct RingBuffer<T> {
    entries: Box<[Option<T>]>,
    front: usize,
    rear: usize,
    count: usize,
}

impl<T> RingBuffer<T> {
    /// Creates an empty ring
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");

        let entries = (0..capacity).map(|_| None).collect::<Vec<_>>();

        Self {
            entries: entries.into_boxed_slice(),
            front: 0,
            // First push lands on index 0
            rear: capacity - 1,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    /// Appends `item` at the rear.
    ///
    /// Returns the evicted oldest entry when the ring was already full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            let oldest = self.entries[self.front].take();
            self.front = self.advance(self.front);
            self.count -= 1;
            oldest
        } else {
            None
        };

        self.rear = self.advance(self.rear);
        self.entries[self.rear] = Some(item);
        self.count += 1;

        evicted
    }

    /// Removes and returns the front entry.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let item = self.entries[self.front].take();
        self.front = self.advance(self.front);
        self.count -= 1;
        item
    }

    /// Returns the front entry without removing it.
    ///
    /// Never touches the indices or the count.
    pub fn peek_front(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.entries[self.front].as_ref()
    }

    fn advance(&self, index: usize) -> usize {
        (index + 1) % self.capacity()
    }
}
