//! Pre-allocated frame storage

/// Reusable buffer holding one compressed frame
///
/// Allocated once at startup and overwritten in place by the producer.
#[derive(Debug)]
pub struct FrameSlot {
    data: Vec<u8>,
    len: usize,
    sequence: u64,
}

impl FrameSlot {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            len: 0,
            sequence: 0,
        }
    }

    /// Valid bytes of the last frame written into this slot
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// True until the slot holds a complete frame
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Overwrites the slot through `fill`, which returns the number of valid
    /// bytes it left in the buffer.
    ///
    /// A failed fill leaves the slot empty.
    pub fn fill<E, F>(&mut self, sequence: u64, fill: F) -> Result<usize, E>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<usize, E>,
    {
        self.len = 0;

        let len = fill(&mut self.data)?;
        self.len = len.min(self.data.len());
        self.sequence = sequence;

        Ok(self.len)
    }
}
