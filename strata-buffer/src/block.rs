use std::ops::Deref;

/// A fixed-capacity, append-only array of values.
///
/// Only the written prefix is ever visible. A block that has been handed to the in-memory list
/// or to a spill file is never written again.
#[derive(Debug, Clone, PartialEq)]
pub struct Block<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> Block<T> {
    /// Allocate an empty block that holds up to `capacity` values.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of values the block can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether another value fits.
    pub fn has_free_capacity(&self) -> bool {
        self.items.len() < self.capacity
    }

    /// Append a value.
    ///
    /// Returns the value back if the block is already full.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        if !self.has_free_capacity() {
            return Err(item);
        }
        self.items.push(item);
        Ok(())
    }

    /// The written prefix.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T> Deref for Block<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use crate::Block;

    #[test]
    fn push_until_full() {
        let mut block = Block::new(2);
        assert!(block.is_empty());
        block.push(1).unwrap();
        block.push(2).unwrap();
        assert!(!block.has_free_capacity());
        assert_eq!(block.push(3), Err(3));
        assert_eq!(block.as_slice(), &[1, 2]);
        assert_eq!(block.len(), 2);
    }
}
