use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::ops::ControlFlow;

use rustc_hash::FxHashSet;
use strata_error::{StrataResult, strata_bail, strata_err};
use uuid::Uuid;

use crate::{Block, BlockElement, BufferOptions, SpillFile};

/// Where a spilled block lives in the overflow file.
#[derive(Debug, Clone, Copy)]
struct SpilledBlock {
    offset: u64,
    len: usize,
    items: usize,
}

/// An append-only sequence of values stored as fixed-capacity blocks.
///
/// Blocks live in three tiers that together form one logical sequence: spilled blocks in the
/// overflow file, completed blocks in memory, and the partially filled current block. Spilled
/// blocks always precede in-memory blocks, which precede the current block. Block `i` is
/// located in constant time from the spill table and the in-memory queue.
///
/// When a new block is admitted and more than `max_in_memory_blocks` completed blocks are held
/// in memory, the oldest is encoded and appended to the overflow file, which is acquired from
/// the [`SpillStorage`](crate::SpillStorage) on first use.
///
/// A buffer has a single writer. It is not safe to push from several threads at once, which the
/// `&mut self` receivers enforce.
pub struct CompositeBuffer<T: BlockElement> {
    id: Uuid,
    options: BufferOptions,
    spilled: Vec<SpilledBlock>,
    in_memory: VecDeque<Block<T>>,
    current: Option<Block<T>>,
    spill: Option<SpillFile>,
    distinct: Option<FxHashSet<T::Key>>,
    len: usize,
}

impl<T: BlockElement> CompositeBuffer<T> {
    /// Create an empty buffer.
    pub fn new(options: BufferOptions) -> StrataResult<Self> {
        if options.block_capacity() == 0 {
            strata_bail!("block capacity must be greater than zero");
        }
        let distinct = options
            .max_distinct_items()
            .filter(|max| *max > 0)
            .map(|_| FxHashSet::default());
        Ok(Self {
            id: Uuid::new_v4(),
            options,
            spilled: Vec::new(),
            in_memory: VecDeque::new(),
            current: None,
            spill: None,
            distinct,
            len: 0,
        })
    }

    /// Unique id of the buffer, used to name its overflow file.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The options the buffer was created with.
    pub fn options(&self) -> &BufferOptions {
        &self.options
    }

    /// Total number of values appended.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of blocks across all tiers, including a partially filled current block.
    pub fn block_count(&self) -> usize {
        self.spilled.len() + self.in_memory.len() + usize::from(self.current.is_some())
    }

    /// Number of blocks held in the overflow file.
    pub fn spilled_block_count(&self) -> usize {
        self.spilled.len()
    }

    /// Number of completed blocks held in memory.
    pub fn in_memory_block_count(&self) -> usize {
        self.in_memory.len()
    }

    /// Number of distinct values seen, while distinct tracking is still live.
    ///
    /// Tracking stops for good once the count reaches `max_distinct_items`.
    pub fn distinct_items(&self) -> Option<usize> {
        self.distinct.as_ref().map(|set| set.len())
    }

    /// Append one value.
    pub fn push(&mut self, item: T) -> StrataResult<()> {
        item.validate()?;
        self.admit_block()?;
        self.track_distinct(&item);

        let Some(current) = self.current.as_mut() else {
            strata_bail!(Internal: "no current block after admission");
        };
        if current.push(item).is_err() {
            strata_bail!(Internal: "current block is full after admission");
        }
        self.len += 1;
        Ok(())
    }

    /// Append every value of `items`, in order.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) -> StrataResult<()> {
        items.into_iter().try_for_each(|item| self.push(item))
    }

    /// Append a copy of every value of `items`, in order.
    pub fn extend_from_slice(&mut self, items: &[T]) -> StrataResult<()> {
        self.extend(items.iter().cloned())
    }

    /// The values of block `index`.
    ///
    /// Spilled blocks are decoded from the overflow file, in-memory blocks are borrowed. An index
    /// beyond [`CompositeBuffer::block_count`] is an internal error.
    pub fn get_block(&self, index: usize) -> StrataResult<Cow<'_, [T]>> {
        if let Some(spilled) = self.spilled.get(index) {
            return self.read_spilled(index, spilled).map(Cow::Owned);
        }
        let memory_index = index - self.spilled.len();
        if let Some(block) = self.in_memory.get(memory_index) {
            return Ok(Cow::Borrowed(block.as_slice()));
        }
        match &self.current {
            Some(block) if memory_index == self.in_memory.len() => {
                Ok(Cow::Borrowed(block.as_slice()))
            }
            _ => Err(strata_err!(
                Internal: "block {index} requested but the buffer holds {} blocks",
                self.block_count()
            )),
        }
    }

    /// Replay every block in append order.
    pub fn blocks(&self) -> impl Iterator<Item = StrataResult<Cow<'_, [T]>>> + '_ {
        (0..self.block_count()).map(|index| self.get_block(index))
    }

    /// Invoke `f` once per block, in append order, until it breaks.
    ///
    /// Returns [`ControlFlow::Break`] if the callback stopped the replay early.
    pub fn for_each_block<F>(&self, mut f: F) -> StrataResult<ControlFlow<()>>
    where
        F: FnMut(&[T]) -> ControlFlow<()>,
    {
        for block in self.blocks() {
            if f(&block?).is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn admit_block(&mut self) -> StrataResult<()> {
        if self.current.as_ref().is_some_and(Block::has_free_capacity) {
            return Ok(());
        }
        if let Some(full) = self.current.take() {
            self.in_memory.push_back(full);
        }
        if let Some(max) = self.options.max_in_memory_blocks() {
            while self.in_memory.len() > max {
                self.spill_oldest()?;
            }
        }
        self.current = Some(Block::new(self.options.block_capacity()));
        Ok(())
    }

    fn spill_oldest(&mut self) -> StrataResult<()> {
        let Some(block) = self.in_memory.front() else {
            return Ok(());
        };
        let mut encoded = Vec::new();
        T::encode_block(block, &mut encoded)?;

        let file = match self.spill.take() {
            Some(file) => file,
            None => {
                log::debug!("buffer {} is spilling to disk", self.id);
                self.options.spill_storage().acquire(self.id)?
            }
        };
        let file = self.spill.insert(file);
        let offset = file.append(&encoded)?;
        self.spilled.push(SpilledBlock {
            offset,
            len: encoded.len(),
            items: block.len(),
        });
        self.in_memory.pop_front();

        self.options.metrics().record_spill(encoded.len());
        Ok(())
    }

    fn read_spilled(&self, index: usize, spilled: &SpilledBlock) -> StrataResult<Vec<T>> {
        let Some(file) = &self.spill else {
            strata_bail!(Internal: "block {index} is spilled but there is no spill file");
        };
        let items = T::decode_block(&file.read(spilled.offset, spilled.len)?)?;
        if items.len() != spilled.items {
            strata_bail!(
                Malformed: "spilled block {index} decoded to {} values, expected {}",
                items.len(),
                spilled.items
            );
        }
        Ok(items)
    }

    fn track_distinct(&mut self, item: &T) {
        let (Some(set), Some(max)) = (self.distinct.as_mut(), self.options.max_distinct_items())
        else {
            return;
        };
        set.insert(item.distinct_key());
        if set.len() >= max {
            log::debug!("buffer {} reached {max} distinct values", self.id);
            self.distinct = None;
        }
    }
}

impl<T: BlockElement> Debug for CompositeBuffer<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeBuffer")
            .field("id", &self.id)
            .field("len", &self.len)
            .field("spilled_blocks", &self.spilled.len())
            .field("in_memory_blocks", &self.in_memory.len())
            .field("distinct_items", &self.distinct_items())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::ops::ControlFlow;
    use std::sync::Arc;

    use rstest::rstest;
    use strata_metrics::{SPILLED_BLOCKS, StrataMetrics};
    use tempfile::TempDir;

    use crate::{BufferOptions, CompositeBuffer, TempDirSpillStorage};

    fn options(dir: &TempDir) -> BufferOptions {
        BufferOptions::default().with_spill_storage(TempDirSpillStorage::new(dir.path()))
    }

    fn replay<T: crate::BlockElement>(buffer: &CompositeBuffer<T>) -> Vec<Vec<T>> {
        let mut blocks = Vec::new();
        buffer
            .for_each_block(|block| {
                blocks.push(block.to_vec());
                ControlFlow::Continue(())
            })
            .unwrap();
        blocks
    }

    #[test]
    fn oldest_block_spills_first() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = StrataMetrics::default();
        let mut buffer = CompositeBuffer::<i32>::new(
            options(&dir)
                .with_block_capacity(4)
                .with_max_in_memory_blocks(1)
                .with_metrics(metrics.clone()),
        )
        .unwrap();
        buffer.extend(1..=9).unwrap();

        assert_eq!(buffer.len(), 9);
        assert_eq!(buffer.block_count(), 3);
        assert_eq!(buffer.spilled_block_count(), 1);
        assert_eq!(buffer.in_memory_block_count(), 1);
        assert_eq!(metrics.counter(SPILLED_BLOCKS).count(), 1);

        assert_eq!(
            replay(&buffer),
            vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8], vec![9]]
        );
        assert_eq!(buffer.get_block(0).unwrap().as_ref(), &[1, 2, 3, 4]);
        assert_eq!(buffer.get_block(1).unwrap().as_ref(), &[5, 6, 7, 8]);
        assert_eq!(buffer.get_block(2).unwrap().as_ref(), &[9]);
    }

    #[test]
    fn block_index_past_end_is_internal_error() {
        let mut buffer = CompositeBuffer::<u8>::new(BufferOptions::default()).unwrap();
        assert!(buffer.get_block(0).is_err());
        buffer.push(1).unwrap();
        assert!(buffer.get_block(0).is_ok());
        let err = buffer.get_block(1).unwrap_err();
        assert!(err.to_string().starts_with("internal error"));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(CompositeBuffer::<u8>::new(BufferOptions::default().with_block_capacity(0)).is_err());
    }

    #[rstest]
    #[case(1, 0, 0)]
    #[case(3, 0, 10)]
    #[case(3, 2, 10)]
    #[case(5, 1, 23)]
    #[case(4, 3, 40)]
    fn spill_threshold(#[case] capacity: usize, #[case] max: usize, #[case] n: usize) {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = CompositeBuffer::<u64>::new(
            options(&dir)
                .with_block_capacity(capacity)
                .with_max_in_memory_blocks(max),
        )
        .unwrap();
        let values = (0..n as u64).collect::<Vec<_>>();
        buffer.extend_from_slice(&values).unwrap();

        let completed = n.saturating_sub(1) / capacity;
        assert_eq!(buffer.in_memory_block_count(), completed.min(max));
        assert_eq!(buffer.spilled_block_count(), completed.saturating_sub(max));
        assert_eq!(replay(&buffer).concat(), values);
        for index in 0..buffer.block_count() {
            let expected = values.chunks(capacity).nth(index).unwrap();
            assert_eq!(buffer.get_block(index).unwrap().as_ref(), expected);
        }
    }

    #[test]
    fn never_spills_without_quota() {
        let mut buffer =
            CompositeBuffer::<f64>::new(BufferOptions::default().with_block_capacity(2)).unwrap();
        buffer.extend((0..11).map(f64::from)).unwrap();
        assert_eq!(buffer.spilled_block_count(), 0);
        assert_eq!(buffer.in_memory_block_count(), 5);
        assert_eq!(buffer.block_count(), 6);
    }

    #[test]
    fn replay_stops_on_break() {
        let mut buffer =
            CompositeBuffer::<i16>::new(BufferOptions::default().with_block_capacity(2)).unwrap();
        buffer.extend(0..10).unwrap();
        let mut seen = 0;
        let flow = buffer
            .for_each_block(|_| {
                seen += 1;
                if seen == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert!(flow.is_break());
        assert_eq!(seen, 2);
    }

    #[test]
    fn distinct_tracking_latches_off() {
        let mut buffer =
            CompositeBuffer::<u32>::new(BufferOptions::default().with_max_distinct_items(3))
                .unwrap();
        buffer.extend([1, 1, 2]).unwrap();
        assert_eq!(buffer.distinct_items(), Some(2));
        buffer.push(3).unwrap();
        assert_eq!(buffer.distinct_items(), None);
        buffer.extend([1, 1, 1]).unwrap();
        assert_eq!(buffer.distinct_items(), None);
    }

    #[test]
    fn distinct_floats_by_bits() {
        let mut buffer =
            CompositeBuffer::<f32>::new(BufferOptions::default().with_max_distinct_items(10))
                .unwrap();
        buffer.extend([0.0, -0.0, f32::NAN, f32::NAN]).unwrap();
        assert_eq!(buffer.distinct_items(), Some(3));
    }

    #[test]
    fn no_tracking_without_limit() {
        let mut buffer = CompositeBuffer::<u32>::new(BufferOptions::default()).unwrap();
        buffer.push(1).unwrap();
        assert_eq!(buffer.distinct_items(), None);
    }

    #[test]
    fn strings_spill_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = CompositeBuffer::<Arc<str>>::new(
            options(&dir)
                .with_block_capacity(2)
                .with_max_in_memory_blocks(0)
                .with_max_distinct_items(100),
        )
        .unwrap();
        let values: Vec<Arc<str>> = ["a", "bb", "a", "ccc", "ü"].map(Arc::from).to_vec();
        buffer.extend_from_slice(&values).unwrap();
        assert_eq!(buffer.spilled_block_count(), 2);
        assert_eq!(buffer.distinct_items(), Some(4));
        assert_eq!(replay(&buffer).concat(), values);
    }

    #[test]
    fn rejected_string_leaves_buffer_untouched() {
        let mut buffer = CompositeBuffer::<Arc<str>>::new(BufferOptions::default()).unwrap();
        let too_long: Arc<str> = "x".repeat(crate::MAX_STRING_UTF16_LEN + 1).into();
        assert!(buffer.push(too_long).unwrap_err().is_out_of_bounds());
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.block_count(), 0);

        let at_bound: Arc<str> = "x".repeat(crate::MAX_STRING_UTF16_LEN).into();
        buffer.push(at_bound.clone()).unwrap();
        assert_eq!(buffer.get_block(0).unwrap().as_ref(), &[at_bound]);
    }

    #[test]
    fn spill_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = CompositeBuffer::<i64>::new(
            options(&dir)
                .with_block_capacity(1)
                .with_max_in_memory_blocks(0),
        )
        .unwrap();
        buffer.extend([1, 2, 3]).unwrap();
        let path = dir.path().join(format!("{}.spill", buffer.id()));
        assert!(path.exists());
        drop(buffer);
        assert!(!path.exists());
    }
}
