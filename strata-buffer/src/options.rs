use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use strata_metrics::StrataMetrics;

use crate::{SpillStorage, TempDirSpillStorage};

/// Default number of values per block.
pub const DEFAULT_BLOCK_CAPACITY: usize = 4096;

/// Configuration of a [`CompositeBuffer`](crate::CompositeBuffer).
#[derive(Clone)]
pub struct BufferOptions {
    block_capacity: usize,
    max_in_memory_blocks: Option<usize>,
    max_distinct_items: Option<usize>,
    spill_storage: Arc<dyn SpillStorage>,
    metrics: StrataMetrics,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            block_capacity: DEFAULT_BLOCK_CAPACITY,
            max_in_memory_blocks: None,
            max_distinct_items: None,
            spill_storage: Arc::new(TempDirSpillStorage::default()),
            metrics: StrataMetrics::default(),
        }
    }
}

impl Debug for BufferOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferOptions")
            .field("block_capacity", &self.block_capacity)
            .field("max_in_memory_blocks", &self.max_in_memory_blocks)
            .field("max_distinct_items", &self.max_distinct_items)
            .field("spill_storage", &self.spill_storage)
            .finish_non_exhaustive()
    }
}

impl BufferOptions {
    /// Number of values per block. Must be greater than zero.
    pub fn with_block_capacity(mut self, block_capacity: usize) -> Self {
        self.block_capacity = block_capacity;
        self
    }

    /// Completed blocks kept in memory before the oldest is spilled. `None` never spills.
    pub fn with_max_in_memory_blocks(mut self, max: impl Into<Option<usize>>) -> Self {
        self.max_in_memory_blocks = max.into();
        self
    }

    /// Track distinct values until this many have been seen. `None` disables tracking.
    pub fn with_max_distinct_items(mut self, max: impl Into<Option<usize>>) -> Self {
        self.max_distinct_items = max.into();
        self
    }

    /// Replace the provider of spill files.
    pub fn with_spill_storage<S: SpillStorage + 'static>(mut self, storage: S) -> Self {
        self.spill_storage = Arc::new(storage);
        self
    }

    /// Record spill activity on `metrics`.
    pub fn with_metrics(mut self, metrics: StrataMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Number of values per block.
    pub fn block_capacity(&self) -> usize {
        self.block_capacity
    }

    /// Completed blocks kept in memory before spilling.
    pub fn max_in_memory_blocks(&self) -> Option<usize> {
        self.max_in_memory_blocks
    }

    /// Distinct values tracked before tracking is abandoned.
    pub fn max_distinct_items(&self) -> Option<usize> {
        self.max_distinct_items
    }

    pub(crate) fn spill_storage(&self) -> &Arc<dyn SpillStorage> {
        &self.spill_storage
    }

    pub(crate) fn metrics(&self) -> &StrataMetrics {
        &self.metrics
    }
}
